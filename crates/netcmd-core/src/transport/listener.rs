//! Listening socket state machine
//!
//! ```text
//! Stopped --start--> Bound(port) --stop / socket error--> Closing(port) --closed--> Stopped
//! ```
//!
//! `Closing` is internal; callers see it as `Bound` until the receive task
//! reports that the socket is gone. Every transition happens in one of the
//! `&mut self` methods below, all called from the controller task.

use std::net::{Ipv4Addr, SocketAddr};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::types::{InboundDatagram, ListenerState, SocketEvent};
use crate::codec;
use crate::error::ListenerError;
use crate::event::{EventSink, ServerStatus};

enum Phase {
    Stopped,
    Bound {
        port: u16,
        generation: u64,
        shutdown: oneshot::Sender<()>,
    },
    Closing {
        port: u16,
        generation: u64,
    },
}

pub struct Listener {
    phase: Phase,
    /// Distinguishes events of the current socket from those of a previous one
    next_generation: u64,
    recv_buffer_size: usize,
    events: EventSink,
    socket_tx: mpsc::UnboundedSender<SocketEvent>,
}

impl Listener {
    pub(crate) fn new(
        events: EventSink,
        socket_tx: mpsc::UnboundedSender<SocketEvent>,
        recv_buffer_size: usize,
    ) -> Self {
        Self {
            phase: Phase::Stopped,
            next_generation: 0,
            recv_buffer_size: recv_buffer_size.max(1),
            events,
            socket_tx,
        }
    }

    pub fn state(&self) -> ListenerState {
        match self.phase {
            Phase::Stopped => ListenerState::Stopped,
            Phase::Bound { port, .. } | Phase::Closing { port, .. } => ListenerState::Bound(port),
        }
    }

    /// Whether a close has been requested but not yet completed
    pub fn is_closing(&self) -> bool {
        matches!(self.phase, Phase::Closing { .. })
    }

    /// Bind the listening socket on `0.0.0.0:port`.
    ///
    /// Rejected while any socket exists, including one that is still closing,
    /// and also when `port` is the port already bound.
    pub async fn start(&mut self, port: u16) -> Result<u16, ListenerError> {
        if let ListenerState::Bound(current) = self.state() {
            let err = ListenerError::AlreadyRunning { port: current };
            self.events.error(format!("{}", err));
            return Err(err);
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        match bind(port).await {
            Ok((socket, local_addr)) => {
                let bound_port = local_addr.port();
                let (shutdown_tx, shutdown_rx) = oneshot::channel();

                tokio::spawn(receive_loop(
                    socket,
                    generation,
                    self.recv_buffer_size,
                    shutdown_rx,
                    self.socket_tx.clone(),
                ));

                self.phase = Phase::Bound {
                    port: bound_port,
                    generation,
                    shutdown: shutdown_tx,
                };
                self.events
                    .info(format!("UDP server listening on {}", local_addr));
                self.events.status(ServerStatus::running(bound_port));
                Ok(bound_port)
            }
            Err(reason) => {
                let err = ListenerError::Bind { port, reason };
                self.events.error(format!("{}", err));
                // No socket was created, so the close completes immediately
                self.finish_close();
                Err(err)
            }
        }
    }

    /// Request the socket to close.
    ///
    /// Returns once the close is under way; the state stays `Bound` until the
    /// receive task confirms it released the socket.
    pub fn stop(&mut self) -> Result<(), ListenerError> {
        match self.phase {
            Phase::Stopped => {
                let err = ListenerError::NotRunning;
                self.events.error(format!("{}", err));
                Err(err)
            }
            Phase::Closing { port, .. } => {
                let err = ListenerError::ShuttingDown { port };
                self.events.error(format!("{}", err));
                Err(err)
            }
            Phase::Bound { .. } => {
                self.begin_close();
                Ok(())
            }
        }
    }

    pub(crate) fn handle_datagram(&self, generation: u64, datagram: InboundDatagram) {
        if !self.is_current(generation) {
            debug!("Dropping datagram from retired listener socket");
            return;
        }
        self.events.recv(format!(
            "Received from {}:{}: {}",
            datagram.source_address,
            datagram.source_port,
            codec::decode(&datagram.payload)
        ));
    }

    pub(crate) fn handle_error(&mut self, generation: u64, error: std::io::Error) {
        if !self.is_current(generation) {
            debug!("Ignoring error from retired listener socket: {}", error);
            return;
        }
        self.events.error(format!("UDP server error: {}", error));
        if matches!(self.phase, Phase::Bound { .. }) {
            self.begin_close();
        }
    }

    pub(crate) fn handle_closed(&mut self, generation: u64) {
        if self.is_current(generation) {
            self.finish_close();
        } else {
            debug!("Ignoring close of retired listener socket");
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        match self.phase {
            Phase::Bound { generation: g, .. } | Phase::Closing { generation: g, .. } => {
                g == generation
            }
            Phase::Stopped => false,
        }
    }

    fn begin_close(&mut self) {
        let phase = std::mem::replace(&mut self.phase, Phase::Stopped);
        self.phase = match phase {
            Phase::Bound {
                port,
                generation,
                shutdown,
            } => {
                debug!("Closing UDP server on port {}", port);
                // The receive task may already be gone after a socket error
                let _ = shutdown.send(());
                Phase::Closing { port, generation }
            }
            other => other,
        };
    }

    fn finish_close(&mut self) {
        self.phase = Phase::Stopped;
        self.events.info("UDP server closed");
        self.events.status(ServerStatus::stopped());
    }
}

async fn bind(port: u16) -> Result<(UdpSocket, SocketAddr), String> {
    if port == 0 {
        return Err("port must be between 1 and 65535".to_string());
    }
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .map_err(|e| e.to_string())?;
    let local_addr = socket.local_addr().map_err(|e| e.to_string())?;
    Ok((socket, local_addr))
}

/// Relay datagrams until shutdown or the first socket error, then report
/// closure. The socket is dropped before `ListenerClosed` is sent.
async fn receive_loop(
    socket: UdpSocket,
    generation: u64,
    buffer_size: usize,
    mut shutdown: oneshot::Receiver<()>,
    socket_tx: mpsc::UnboundedSender<SocketEvent>,
) {
    let mut buffer = vec![0u8; buffer_size];

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            result = socket.recv_from(&mut buffer) => {
                match result {
                    Ok((len, source)) => {
                        let datagram = InboundDatagram {
                            payload: Bytes::copy_from_slice(&buffer[..len]),
                            source_address: source.ip().to_string(),
                            source_port: source.port(),
                        };
                        let _ = socket_tx.send(SocketEvent::Datagram { generation, datagram });
                    }
                    Err(error) => {
                        let _ = socket_tx.send(SocketEvent::ListenerError { generation, error });
                        break;
                    }
                }
            }
        }
    }

    drop(socket);
    let _ = socket_tx.send(SocketEvent::ListenerClosed { generation });
}
