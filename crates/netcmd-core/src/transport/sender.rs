//! Persistent client socket
//!
//! Bound once to an ephemeral port and kept for the lifetime of the
//! controller. A watcher task reads the socket so that asynchronous errors
//! (ICMP port unreachable and friends) surface as log events instead of
//! silently poisoning later sends.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::types::{Endpoint, SendRequest, SocketEvent};
use crate::codec;
use crate::error::SendError;
use crate::event::EventSink;

/// Size of the scratch buffer the watcher reads stray datagrams into
const WATCH_BUFFER_SIZE: usize = 2048;

/// Pause after the first consecutive socket error, doubled per repeat
const ERROR_BACKOFF_BASE: Duration = Duration::from_millis(50);
const ERROR_BACKOFF_MAX: Duration = Duration::from_secs(5);

pub struct Sender {
    socket: Arc<UdpSocket>,
    watcher: JoinHandle<()>,
    events: EventSink,
}

impl Sender {
    /// Bind the client socket and start its error watcher
    pub(crate) async fn bind(
        events: EventSink,
        socket_tx: mpsc::UnboundedSender<SocketEvent>,
    ) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?);
        debug!("UDP client bound to {}", socket.local_addr()?);

        let watcher = tokio::spawn(watch_client(Arc::clone(&socket), socket_tx));

        Ok(Self {
            socket,
            watcher,
            events,
        })
    }

    /// Local address of the client socket
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Encode and transmit one datagram.
    ///
    /// Emits exactly one `sent` or `error` log for the request.
    pub async fn send(&self, request: &SendRequest) -> Result<(), SendError> {
        match self.transmit(request).await {
            Ok(len) => {
                self.events.sent(format!(
                    "Sent UDP command to {} ({} bytes): {}",
                    request.destination,
                    len,
                    request.payload.trim()
                ));
                Ok(())
            }
            Err(e) => {
                self.events.error(format!(
                    "Failed to send UDP command to {}: {}",
                    request.destination, e
                ));
                Err(e)
            }
        }
    }

    async fn transmit(&self, request: &SendRequest) -> Result<usize, SendError> {
        // Nothing touches the socket until payload and destination are valid
        let payload = codec::encode(&request.payload)?;
        request.destination.validate()?;

        let target = resolve(&request.destination).await?;
        let sent = self
            .socket
            .send_to(&payload, target)
            .await
            .map_err(|e| SendError::TransportFailure(e.to_string()))?;

        if sent != payload.len() {
            return Err(SendError::TransportFailure(format!(
                "short send: {} of {} bytes",
                sent,
                payload.len()
            )));
        }
        Ok(sent)
    }

    /// Close the client socket. Only called on controller shutdown.
    pub(crate) fn close(self) {
        self.watcher.abort();
        debug!("UDP client closed");
    }

    pub(crate) fn report_error(&self, error: &std::io::Error) {
        self.events.error(format!("UDP client error: {}", error));
    }
}

/// Resolve to the first IPv4 address of the endpoint
async fn resolve(endpoint: &Endpoint) -> Result<SocketAddr, SendError> {
    let mut addrs = tokio::net::lookup_host((endpoint.address.as_str(), endpoint.port))
        .await
        .map_err(|e| {
            SendError::TransportFailure(format!("cannot resolve {}: {}", endpoint.address, e))
        })?;

    addrs.find(SocketAddr::is_ipv4).ok_or_else(|| {
        SendError::TransportFailure(format!("no IPv4 address for {}", endpoint.address))
    })
}

/// Delay before reading again after `consecutive` errors in a row
fn error_backoff(consecutive: u32) -> Duration {
    let shift = consecutive.saturating_sub(1).min(16);
    ERROR_BACKOFF_BASE
        .saturating_mul(1u32 << shift)
        .min(ERROR_BACKOFF_MAX)
}

async fn watch_client(socket: Arc<UdpSocket>, socket_tx: mpsc::UnboundedSender<SocketEvent>) {
    let mut buffer = vec![0u8; WATCH_BUFFER_SIZE];
    let mut consecutive_errors = 0u32;
    loop {
        match socket.recv_from(&mut buffer).await {
            Ok((len, source)) => {
                consecutive_errors = 0;
                debug!("Discarding {} byte datagram from {} on client socket", len, source);
            }
            Err(e) => {
                consecutive_errors = consecutive_errors.saturating_add(1);
                if socket_tx.send(SocketEvent::ClientError(e)).is_err() {
                    break;
                }
                // A persistent error would otherwise flood the event channel
                tokio::time::sleep(error_backoff(consecutive_errors)).await;
            }
        }
    }
}
