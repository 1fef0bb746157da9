//! Datagram transport controller
//!
//! One tokio task owns the persistent client socket ([`Sender`]) and the
//! optional listening socket ([`Listener`]). Callers talk to it through a
//! cloneable [`ControllerHandle`]; socket activity reaches the caller's
//! [`Observer`](crate::event::Observer).

mod controller;
mod listener;
mod sender;
mod types;

pub use controller::{Controller, ControllerHandle};
pub use listener::Listener;
pub use sender::Sender;
pub use types::{Endpoint, InboundDatagram, ListenerState, SendRequest};
