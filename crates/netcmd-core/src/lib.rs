pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod library;
pub mod transport;

pub use codec::Payload;
pub use config::AppConfig;
pub use error::{DecodeError, Error, ListenerError, Result, SendError};
pub use event::{ChannelObserver, ControllerEvent, LogEvent, LogKind, Observer, ServerStatus};
pub use library::{Command, CommandLibrary};
pub use transport::{Controller, ControllerHandle, Endpoint, ListenerState, SendRequest};
