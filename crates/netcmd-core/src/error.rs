use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Transport controller has shut down")]
    ControllerClosed,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Malformed hex text. Never reaches the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid hex character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },

    #[error("odd number of hex digits ({digits})")]
    OddLength { digits: usize },
}

/// Per-request send failure. Does not affect later sends.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] DecodeError),

    #[error("invalid destination {address}:{port}")]
    InvalidEndpoint { address: String, port: u16 },

    #[error("transport failure: {0}")]
    TransportFailure(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    #[error("failed to bind port {port}: {reason}")]
    Bind { port: u16, reason: String },

    #[error("UDP server already running on port {port}")]
    AlreadyRunning { port: u16 },

    #[error("UDP server is not running")]
    NotRunning,

    #[error("UDP server on port {port} is already shutting down")]
    ShuttingDown { port: u16 },
}
