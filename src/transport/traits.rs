//! Transport trait abstraction for pluggable radio backends

use async_trait::async_trait;
use link_shared::RemoteEndpoint;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// A transport stream that can read and write bytes
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> TransportStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// An opened transport, owned by exactly one worker at a time
pub type BoxedStream = Box<dyn TransportStream>;

/// Platform layer that opens transports to remote endpoints
#[async_trait]
pub trait RfcommPlatform: Send + Sync + 'static {
    /// Open via the normal path (service record / configured channel)
    async fn open_normal(&self, endpoint: &RemoteEndpoint) -> io::Result<BoxedStream>;

    /// Open via the alternate channel, used only after the normal path failed
    async fn open_fallback(&self, endpoint: &RemoteEndpoint) -> io::Result<BoxedStream>;

    /// Stop any in-flight device scan (best effort)
    fn cancel_discovery(&self);

    /// Human-readable name for this platform
    fn name(&self) -> &'static str;
}
