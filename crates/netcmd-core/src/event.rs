//! Observer contract for transport activity
//!
//! The controller reports everything it does as [`LogEvent`]s plus
//! [`ServerStatus`] changes of the listener. Delivery is fire-and-forget:
//! observers are called synchronously on the controller task and cannot push
//! back.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Sent,
    Recv,
    Error,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogKind::Info => write!(f, "info"),
            LogKind::Sent => write!(f, "sent"),
            LogKind::Recv => write!(f, "recv"),
            LogKind::Error => write!(f, "error"),
        }
    }
}

/// One line of the user-facing activity log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub message: String,
    pub kind: LogKind,
}

impl LogEvent {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

/// Listener status notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl ServerStatus {
    pub fn running(port: u16) -> Self {
        Self {
            running: true,
            port: Some(port),
        }
    }

    pub fn stopped() -> Self {
        Self {
            running: false,
            port: None,
        }
    }
}

/// Sink for controller events, implemented by whatever renders them
pub trait Observer: Send + Sync {
    fn on_log(&self, event: LogEvent);
    fn on_status(&self, status: ServerStatus);
}

/// Everything an observer can be told, as a single value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Log(LogEvent),
    Status(ServerStatus),
}

/// Observer that forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<ControllerEvent>) -> Self {
        Self { tx }
    }

    /// Create an observer together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send_event(&self, event: ControllerEvent) {
        if self.tx.send(event).is_err() {
            warn!("Failed to send controller event: receiver dropped");
        }
    }
}

impl Observer for ChannelObserver {
    fn on_log(&self, event: LogEvent) {
        self.send_event(ControllerEvent::Log(event));
    }

    fn on_status(&self, status: ServerStatus) {
        self.send_event(ControllerEvent::Status(status));
    }
}

/// Shared emitter used by the sender and the listener.
///
/// Every user-facing event is also traced at debug level.
#[derive(Clone)]
pub(crate) struct EventSink {
    observer: Arc<dyn Observer>,
}

impl EventSink {
    pub(crate) fn new(observer: Arc<dyn Observer>) -> Self {
        Self { observer }
    }

    pub(crate) fn log(&self, kind: LogKind, message: impl Into<String>) {
        let event = LogEvent::new(kind, message);
        debug!(kind = %event.kind, "{}", event.message);
        self.observer.on_log(event);
    }

    pub(crate) fn info(&self, message: impl Into<String>) {
        self.log(LogKind::Info, message);
    }

    pub(crate) fn sent(&self, message: impl Into<String>) {
        self.log(LogKind::Sent, message);
    }

    pub(crate) fn recv(&self, message: impl Into<String>) {
        self.log(LogKind::Recv, message);
    }

    pub(crate) fn error(&self, message: impl Into<String>) {
        self.log(LogKind::Error, message);
    }

    pub(crate) fn status(&self, status: ServerStatus) {
        debug!(running = status.running, port = ?status.port, "Listener status changed");
        self.observer.on_status(status);
    }
}
