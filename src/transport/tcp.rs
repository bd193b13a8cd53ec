//! TCP platform simulating the radio link for development
//!
//! Endpoint addresses are `host:port` strings. The fallback open connects to
//! the configured alternate address, or retries the endpoint address when
//! none is set.

use crate::transport::traits::{BoxedStream, RfcommPlatform};
use async_trait::async_trait;
use link_shared::RemoteEndpoint;
use std::io;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// TCP platform for connecting to a simulated peer
pub struct TcpPlatform {
    fallback_address: Option<String>,
}

impl TcpPlatform {
    /// Create a TCP platform whose fallback retries the endpoint address
    pub fn new() -> Self {
        Self {
            fallback_address: None,
        }
    }

    /// Create a TCP platform with a dedicated fallback address
    pub fn with_fallback(address: impl Into<String>) -> Self {
        Self {
            fallback_address: Some(address.into()),
        }
    }

    async fn open(&self, address: &str) -> io::Result<BoxedStream> {
        info!("[TCP] Connecting to {}", address);
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        info!("[TCP] Connected to {}", address);
        Ok(Box::new(stream))
    }
}

impl Default for TcpPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RfcommPlatform for TcpPlatform {
    async fn open_normal(&self, endpoint: &RemoteEndpoint) -> io::Result<BoxedStream> {
        self.open(&endpoint.address).await
    }

    async fn open_fallback(&self, endpoint: &RemoteEndpoint) -> io::Result<BoxedStream> {
        let address = self
            .fallback_address
            .as_deref()
            .unwrap_or(&endpoint.address);
        self.open(address).await
    }

    fn cancel_discovery(&self) {
        debug!("[TCP] No discovery to cancel");
    }

    fn name(&self) -> &'static str {
        "TCP simulation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_platform_name() {
        assert_eq!(TcpPlatform::new().name(), "TCP simulation");
    }

    #[tokio::test]
    async fn test_open_normal_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"hi").await.unwrap();
        });

        let platform = TcpPlatform::new();
        let mut stream = platform
            .open_normal(&RemoteEndpoint::from_address(addr.to_string()))
            .await
            .expect("connect failed");

        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");
    }

    #[tokio::test]
    async fn test_fallback_uses_alternate_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        // Reserve a port, then free it so the normal open is refused
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);

        let platform = TcpPlatform::with_fallback(addr.to_string());
        let endpoint = RemoteEndpoint::from_address(dead_addr.to_string());

        assert!(platform.open_normal(&endpoint).await.is_err());
        assert!(platform.open_fallback(&endpoint).await.is_ok());
    }
}
