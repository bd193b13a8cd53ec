//! RFCOMM serial link
//!
//! Manages the lifecycle of one serial-over-radio connection: connecting
//! (with a single fallback open), reading incoming text, writing outgoing
//! bytes and reporting every state transition to a listener.

pub mod config;
pub mod connection;
pub mod transport;

pub use config::{BluetoothConfig, BluetoothMode, LinkConfig, LoggingConfig};
pub use connection::{ChannelListener, ConnectionEvent, LinkListener, SerialLink};
pub use link_shared::{ConnectionState, LinkError, OpenStrategy, RemoteEndpoint, StreamOp};
pub use transport::{BoxedStream, RfcommPlatform, TcpPlatform, TransportStream};
