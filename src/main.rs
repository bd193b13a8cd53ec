use anyhow::{Context, Result};
use rfcomm_link::transport::platform_from_config;
use rfcomm_link::{
    ChannelListener, ConnectionEvent, ConnectionState, LinkConfig, RemoteEndpoint, SerialLink,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "usage: rfcomm-link [--config <file>] [<address> [<name>]]";

#[tokio::main]
async fn main() -> Result<()> {
    let (config_path, target) = parse_args(std::env::args().skip(1))?;

    let config = match &config_path {
        Some(path) => LinkConfig::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => LinkConfig::default(),
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let endpoint = target
        .or_else(|| config.device.clone())
        .context(USAGE)?;

    info!("Serial link starting");
    info!("  Mode: {:?}", config.bluetooth.mode);
    info!("  Device: {}", endpoint);

    let platform = platform_from_config(&config.bluetooth)?;
    let (listener, mut events) = ChannelListener::new();
    let link = SerialLink::new(platform, Arc::new(listener), &config);

    link.connect(endpoint);

    // Forward stdin lines to the link
    let mut input = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    let mut input_open = true;

    // Main event loop
    loop {
        tokio::select! {
            line = input.recv(), if input_open => match line {
                Some(line) => link.write(format!("{line}\n").as_bytes()).await,
                None => {
                    debug!("stdin closed");
                    input_open = false;
                }
            },
            event = events.recv() => match event {
                Some(ConnectionEvent::StateChanged(state)) => {
                    info!("State: {}", state);
                }
                Some(ConnectionEvent::Connected { message }) => {
                    info!("{}", message);
                }
                Some(ConnectionEvent::Data(data)) => {
                    print!("{}", data);
                    let _ = std::io::stdout().flush();
                }
                Some(ConnectionEvent::Error(e)) => {
                    warn!("Link error ({:?}): {}", e.kind(), e);
                }
                Some(ConnectionEvent::ConnectionFailed { message }) => {
                    error!("{}", message);
                    break;
                }
                Some(ConnectionEvent::ConnectionLost { message }) => {
                    error!("{}", message);
                    // A replaced session's loss leaves the newer attempt running
                    if link.state() == ConnectionState::None {
                        break;
                    }
                }
                None => {
                    error!("Link listener closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping link");
                break;
            }
        }
    }

    link.stop();
    Ok(())
}

/// Read lines on a plain thread so a pending read never holds up shutdown
fn spawn_line_reader<R>(reader: R) -> mpsc::UnboundedReceiver<String>
where
    R: BufRead + Send + 'static,
{
    let (line_tx, line_rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    line_rx
}

/// Parse `[--config <file>] [<address> [<name>]]`
fn parse_args(
    mut args: impl Iterator<Item = String>,
) -> Result<(Option<PathBuf>, Option<RemoteEndpoint>)> {
    let mut config_path = None;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a file")?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => anyhow::bail!(USAGE),
            _ => positional.push(arg),
        }
    }

    let target = match positional.len() {
        0 => None,
        1 => Some(RemoteEndpoint::from_address(positional.remove(0))),
        2 => {
            let name = positional.pop().unwrap_or_default();
            Some(RemoteEndpoint::new(positional.remove(0), name))
        }
        _ => anyhow::bail!(USAGE),
    };

    Ok((config_path, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_address_and_name() {
        let (config, target) = parse_args(args(&["00:11:22:33:44:55", "HC-05"])).unwrap();
        assert!(config.is_none());
        assert_eq!(target, Some(RemoteEndpoint::new("00:11:22:33:44:55", "HC-05")));
    }

    #[test]
    fn test_parse_config_only() {
        let (config, target) = parse_args(args(&["--config", "link.toml"])).unwrap();
        assert_eq!(config, Some(PathBuf::from("link.toml")));
        assert!(target.is_none());
    }

    /// Reader that blocks until its feed delivers bytes or is dropped
    struct FeedReader(std::sync::mpsc::Receiver<Vec<u8>>);

    impl std::io::Read for FeedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.recv() {
                Ok(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Err(_) => Ok(0),
            }
        }
    }

    #[test]
    fn test_line_reader_forwards_lines() {
        let mut lines = spawn_line_reader(std::io::Cursor::new("one\ntwo\n"));
        assert_eq!(lines.blocking_recv().as_deref(), Some("one"));
        assert_eq!(lines.blocking_recv().as_deref(), Some("two"));
        assert!(lines.blocking_recv().is_none());
    }

    #[test]
    fn test_pending_input_does_not_block_runtime_shutdown() {
        let (feed, source) = std::sync::mpsc::channel();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut lines =
            runtime.block_on(async { spawn_line_reader(std::io::BufReader::new(FeedReader(source))) });

        let started = std::time::Instant::now();
        drop(runtime);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        feed.send(b"late\n".to_vec()).unwrap();
        assert_eq!(lines.blocking_recv().as_deref(), Some("late"));
        drop(feed);
        assert!(lines.blocking_recv().is_none());
    }

    #[test]
    fn test_parse_rejects_extra_args() {
        assert!(parse_args(args(&["a", "b", "c"])).is_err());
        assert!(parse_args(args(&["--config"])).is_err());
    }
}
