use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::listener::Listener;
use super::sender::Sender;
use super::types::{ListenerState, SendRequest, SocketEvent};
use crate::config::NetworkConfig;
use crate::error::{ListenerError, SendError};
use crate::event::{EventSink, Observer};
use crate::{Error, Result};

/// Requests from handles to the controller task
enum Request {
    Start {
        port: u16,
        reply: oneshot::Sender<std::result::Result<u16, ListenerError>>,
    },
    Stop {
        reply: oneshot::Sender<std::result::Result<(), ListenerError>>,
    },
    Send {
        request: SendRequest,
        reply: oneshot::Sender<std::result::Result<(), SendError>>,
    },
    State {
        reply: oneshot::Sender<ListenerState>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Owner of both sockets. Runs as a single task; see [`Controller::spawn`].
pub struct Controller {
    sender: Sender,
    listener: Listener,
    requests: mpsc::UnboundedReceiver<Request>,
    sockets: mpsc::UnboundedReceiver<SocketEvent>,
}

impl Controller {
    /// Bind the client socket and start the controller task.
    ///
    /// The client socket lives until [`ControllerHandle::shutdown`] or until
    /// every handle is dropped.
    pub async fn spawn(
        config: &NetworkConfig,
        observer: Arc<dyn Observer>,
    ) -> Result<ControllerHandle> {
        let events = EventSink::new(observer);
        let (socket_tx, sockets) = mpsc::unbounded_channel();
        let (request_tx, requests) = mpsc::unbounded_channel();

        let sender = Sender::bind(events.clone(), socket_tx.clone()).await?;
        info!("UDP client ready on {}", sender.local_addr()?);
        let listener = Listener::new(events, socket_tx, config.recv_buffer_size);

        let controller = Self {
            sender,
            listener,
            requests,
            sockets,
        };
        tokio::spawn(controller.run());

        Ok(ControllerHandle { tx: request_tx })
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                request = self.requests.recv() => {
                    match request {
                        Some(request) => {
                            if let Some(reply) = self.handle_request(request).await {
                                self.shutdown().await;
                                let _ = reply.send(());
                                return;
                            }
                        }
                        None => {
                            debug!("All controller handles dropped");
                            self.shutdown().await;
                            return;
                        }
                    }
                }
                Some(event) = self.sockets.recv() => self.handle_socket_event(event),
            }
        }
    }

    /// Returns the reply channel when the request asks for shutdown
    async fn handle_request(&mut self, request: Request) -> Option<oneshot::Sender<()>> {
        match request {
            Request::Start { port, reply } => {
                let result = self.listener.start(port).await;
                let _ = reply.send(result);
            }
            Request::Stop { reply } => {
                let _ = reply.send(self.listener.stop());
            }
            Request::Send { request, reply } => {
                let _ = reply.send(self.sender.send(&request).await);
            }
            Request::State { reply } => {
                let _ = reply.send(self.listener.state());
            }
            Request::Shutdown { reply } => return Some(reply),
        }
        None
    }

    fn handle_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Datagram {
                generation,
                datagram,
            } => self.listener.handle_datagram(generation, datagram),
            SocketEvent::ListenerError { generation, error } => {
                self.listener.handle_error(generation, error)
            }
            SocketEvent::ListenerClosed { generation } => self.listener.handle_closed(generation),
            SocketEvent::ClientError(error) => self.sender.report_error(&error),
        }
    }

    /// Close the listener (waiting for its completion) and then the client
    async fn shutdown(mut self) {
        if self.listener.state().is_bound() {
            if !self.listener.is_closing() {
                let _ = self.listener.stop();
            }
            while self.listener.state().is_bound() {
                match self.sockets.recv().await {
                    Some(event) => self.handle_socket_event(event),
                    None => break,
                }
            }
        }
        self.sender.close();
        info!("Transport controller stopped");
    }
}

/// Cloneable handle to a running [`Controller`]
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Request>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Start { port, .. } => write!(f, "Start({})", port),
            Request::Stop { .. } => write!(f, "Stop"),
            Request::Send { request, .. } => write!(f, "Send({})", request.destination),
            Request::State { .. } => write!(f, "State"),
            Request::Shutdown { .. } => write!(f, "Shutdown"),
        }
    }
}

impl ControllerHandle {
    /// Start the listener on `port`; resolves after the bind attempt
    pub async fn start(&self, port: u16) -> Result<u16> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Start { port, reply })?;
        Ok(rx.await.map_err(|_| Error::ControllerClosed)??)
    }

    /// Begin closing the listener.
    ///
    /// Resolves once the close is under way, not when it has completed; watch
    /// for the `running: false` status to know the socket is gone.
    pub async fn stop(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Stop { reply })?;
        Ok(rx.await.map_err(|_| Error::ControllerClosed)??)
    }

    /// Encode and send one datagram through the persistent client socket
    pub async fn send(&self, request: SendRequest) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Send { request, reply })?;
        Ok(rx.await.map_err(|_| Error::ControllerClosed)??)
    }

    pub async fn state(&self) -> Result<ListenerState> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::State { reply })?;
        rx.await.map_err(|_| Error::ControllerClosed)
    }

    /// Close both sockets and stop the controller task
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Shutdown { reply })?;
        rx.await.map_err(|_| Error::ControllerClosed)
    }

    fn request(&self, request: Request) -> Result<()> {
        self.tx.send(request).map_err(|e| {
            warn!("Controller is gone, dropping {:?}", e.0);
            Error::ControllerClosed
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    use super::*;
    use crate::event::{ChannelObserver, ControllerEvent, LogEvent, LogKind, ServerStatus};
    use crate::transport::types::Endpoint;

    struct Harness {
        handle: ControllerHandle,
        /// Injects socket activity as if it came from the socket tasks
        socket_tx: mpsc::UnboundedSender<SocketEvent>,
        events: mpsc::UnboundedReceiver<ControllerEvent>,
    }

    async fn harness() -> Harness {
        let (observer, events) = ChannelObserver::channel();
        let sink = EventSink::new(Arc::new(observer));
        let (socket_tx, sockets) = mpsc::unbounded_channel();
        let (request_tx, requests) = mpsc::unbounded_channel();

        let sender = Sender::bind(sink.clone(), socket_tx.clone()).await.unwrap();
        let listener = Listener::new(sink, socket_tx.clone(), 1024);
        tokio::spawn(
            Controller {
                sender,
                listener,
                requests,
                sockets,
            }
            .run(),
        );

        Harness {
            handle: ControllerHandle { tx: request_tx },
            socket_tx,
            events,
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<ControllerEvent>) -> ControllerEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for controller event")
            .expect("observer channel closed")
    }

    fn free_port() -> u16 {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
        socket.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_client_socket_error_keeps_sender_alive() {
        let mut h = harness().await;
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = peer.local_addr().unwrap().port();

        h.socket_tx
            .send(SocketEvent::ClientError(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
            .unwrap();
        match next_event(&mut h.events).await {
            ControllerEvent::Log(LogEvent {
                kind: LogKind::Error,
                message,
            }) => assert!(message.starts_with("UDP client error")),
            other => panic!("expected client error log, got {:?}", other),
        }

        h.handle
            .send(SendRequest::new(Endpoint::new("127.0.0.1", port), "be ef"))
            .await
            .unwrap();
        let mut buf = [0u8; 4];
        let (len, _) = timeout(Duration::from_secs(5), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], &[0xbe, 0xef]);
        assert!(matches!(
            next_event(&mut h.events).await,
            ControllerEvent::Log(LogEvent {
                kind: LogKind::Sent,
                ..
            })
        ));

        h.handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_listener_socket_error_runs_stop_path() {
        let mut h = harness().await;
        let port = free_port();
        h.handle.start(port).await.unwrap();
        assert!(matches!(
            next_event(&mut h.events).await,
            ControllerEvent::Log(LogEvent {
                kind: LogKind::Info,
                ..
            })
        ));
        assert_eq!(
            next_event(&mut h.events).await,
            ControllerEvent::Status(ServerStatus::running(port))
        );

        // First listener socket of a controller is generation 0
        h.socket_tx
            .send(SocketEvent::ListenerError {
                generation: 0,
                error: std::io::Error::new(std::io::ErrorKind::Other, "network is down"),
            })
            .unwrap();

        // The receive task confirms closure through ListenerClosed
        let mut seen = Vec::new();
        loop {
            let event = next_event(&mut h.events).await;
            let done = matches!(event, ControllerEvent::Status(s) if !s.running);
            seen.push(event);
            if done {
                break;
            }
        }

        let kinds: Vec<LogKind> = seen
            .iter()
            .filter_map(|e| match e {
                ControllerEvent::Log(log) => Some(log.kind),
                ControllerEvent::Status(_) => None,
            })
            .collect();
        assert_eq!(kinds, vec![LogKind::Error, LogKind::Info]);
        assert_eq!(h.handle.state().await.unwrap(), ListenerState::Stopped);

        // The port was released and can be bound again
        assert_eq!(h.handle.start(port).await.unwrap(), port);
        h.handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_listener_events_are_ignored() {
        let mut h = harness().await;
        let port = free_port();
        h.handle.start(port).await.unwrap();
        next_event(&mut h.events).await;
        next_event(&mut h.events).await;

        h.socket_tx
            .send(SocketEvent::ListenerClosed { generation: 7 })
            .unwrap();
        assert_eq!(h.handle.state().await.unwrap(), ListenerState::Bound(port));
        assert!(h.events.try_recv().is_err());

        h.handle.shutdown().await.unwrap();
    }
}
