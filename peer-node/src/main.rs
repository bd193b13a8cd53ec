use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_BIND: &str = "127.0.0.1:9000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let bind = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_BIND.into());
    let listener = TcpListener::bind(&bind).await?;
    info!("Peer listening on {}", listener.local_addr()?);

    loop {
        let (socket, addr) = listener.accept().await?;
        info!("[PEER] Link connected from {}", addr);
        tokio::spawn(async move {
            match echo(socket).await {
                Ok(total) => info!("[PEER] {} disconnected after {} bytes", addr, total),
                Err(e) => warn!("[PEER] {} failed: {}", addr, e),
            }
        });
    }
}

/// Echo everything back until the link closes, returning the byte count
async fn echo(mut socket: TcpStream) -> std::io::Result<u64> {
    let mut buf = vec![0u8; 1024];
    let mut total = 0u64;

    loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        socket.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            echo(socket).await.unwrap()
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        drop(client);
        assert_eq!(server.await.unwrap(), 4);
    }
}
