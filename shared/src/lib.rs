//! RFCOMM Link Shared Types
//!
//! This crate provides the types shared between the link core, its platforms
//! and the peer tooling: connection states, remote endpoints, the error
//! taxonomy and the streaming text decoder.

pub mod error;
pub mod state_machine;
pub mod text;

use serde::Deserialize;
use std::fmt;

pub use error::{LinkError, OpenStrategy, StreamOp};
pub use text::Utf8ChunkDecoder;

/// Link parameters shared by every platform
pub mod defaults {
    /// Size of a single read from the transport
    pub const READ_BUFFER_SIZE: usize = 1024;

    /// RFCOMM channel used by the fallback open
    pub const FALLBACK_RFCOMM_CHANNEL: u8 = 1;

    /// Serial Port Profile service UUID advertised by the peer
    pub const SPP_SERVICE_UUID: &str = "8ce255c0-200a-11e0-ac64-0800200c9a66";

    /// Message reported after a successful open, followed by the device name
    pub const CONNECTED_PREFIX: &str = "Connected to ";

    /// Message reported when both open strategies failed
    pub const CONNECTION_FAILED_MESSAGE: &str = "Unable to connect to device";

    /// Message reported when an established session ends
    pub const CONNECTION_LOST_MESSAGE: &str = "Device connection was lost";
}

/// State of the single connection slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Doing nothing
    #[default]
    None,
    /// Idle and ready for a connect request
    Listening,
    /// Outbound connection attempt in flight
    Connecting,
    /// Session established with a remote device
    Connected,
}

impl ConnectionState {
    /// Name reported to listeners
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::None => "none",
            ConnectionState::Listening => "listen",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote device targeted by a connection attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct RemoteEndpoint {
    /// Platform address (MAC for RFCOMM, `host:port` for TCP simulation)
    pub address: String,
    /// Human-readable device name
    pub name: String,
}

impl RemoteEndpoint {
    /// Create a new endpoint
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    /// Create an endpoint whose display name is its address
    pub fn from_address(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            name: address.clone(),
            address,
        }
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.address {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} ({})", self.name, self.address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::None.to_string(), "none");
        assert_eq!(ConnectionState::Listening.to_string(), "listen");
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }

    #[test]
    fn test_default_state_is_none() {
        assert_eq!(ConnectionState::default(), ConnectionState::None);
    }

    #[test]
    fn test_endpoint_display() {
        let named = RemoteEndpoint::new("00:11:22:33:44:55", "HC-05");
        assert_eq!(named.to_string(), "HC-05 (00:11:22:33:44:55)");

        let bare = RemoteEndpoint::from_address("127.0.0.1:9000");
        assert_eq!(bare.name, "127.0.0.1:9000");
        assert_eq!(bare.to_string(), "127.0.0.1:9000");
    }
}
