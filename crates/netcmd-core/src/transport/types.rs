use std::fmt;
use std::io;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::SendError;

/// Destination or source of a datagram
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Resolved by the transport layer; IPv4 literal or host name
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Port 0 and blank addresses cannot be sent to
    pub fn validate(&self) -> Result<(), SendError> {
        if self.port == 0 || self.address.trim().is_empty() {
            return Err(SendError::InvalidEndpoint {
                address: self.address.clone(),
                port: self.port,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = String;

    /// Parse `host:port`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| format!("expected <address>:<port>, got '{}'", s))?;
        let port: u16 = port
            .parse()
            .map_err(|_| format!("invalid port '{}'", port))?;
        let endpoint = Endpoint::new(address, port);
        endpoint.validate().map_err(|e| e.to_string())?;
        Ok(endpoint)
    }
}

/// One outbound datagram: hex text is decoded at send time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub destination: Endpoint,
    pub payload: String,
}

impl SendRequest {
    pub fn new(destination: Endpoint, payload: impl Into<String>) -> Self {
        Self {
            destination,
            payload: payload.into(),
        }
    }
}

/// A datagram received by the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundDatagram {
    pub payload: Bytes,
    pub source_address: String,
    pub source_port: u16,
}

/// Listener state as seen by callers.
///
/// A listener whose close is still in flight reports `Bound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerState {
    #[default]
    Stopped,
    Bound(u16),
}

impl ListenerState {
    pub fn is_bound(&self) -> bool {
        matches!(self, ListenerState::Bound(_))
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            ListenerState::Bound(port) => Some(*port),
            ListenerState::Stopped => None,
        }
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::Stopped => write!(f, "stopped"),
            ListenerState::Bound(port) => write!(f, "running (port {})", port),
        }
    }
}

/// Socket activity reported back to the controller task
#[derive(Debug)]
pub(crate) enum SocketEvent {
    Datagram {
        generation: u64,
        datagram: InboundDatagram,
    },
    ListenerError {
        generation: u64,
        error: io::Error,
    },
    ListenerClosed {
        generation: u64,
    },
    ClientError(io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parse() {
        let endpoint: Endpoint = "192.168.1.20:9000".parse().unwrap();
        assert_eq!(endpoint, Endpoint::new("192.168.1.20", 9000));
        assert_eq!(endpoint.to_string(), "192.168.1.20:9000");
    }

    #[test]
    fn test_endpoint_parse_rejects_bad_input() {
        assert!("localhost".parse::<Endpoint>().is_err());
        assert!("localhost:0".parse::<Endpoint>().is_err());
        assert!("localhost:65536".parse::<Endpoint>().is_err());
        assert!(":9000".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_endpoint_validate() {
        assert!(Endpoint::new("127.0.0.1", 1).validate().is_ok());
        assert!(Endpoint::new("127.0.0.1", 65535).validate().is_ok());
        assert!(matches!(
            Endpoint::new("127.0.0.1", 0).validate(),
            Err(SendError::InvalidEndpoint { port: 0, .. })
        ));
    }

    #[test]
    fn test_listener_state() {
        assert_eq!(ListenerState::default(), ListenerState::Stopped);
        assert!(ListenerState::Bound(9000).is_bound());
        assert_eq!(ListenerState::Bound(9000).port(), Some(9000));
        assert_eq!(ListenerState::Stopped.port(), None);
    }
}
