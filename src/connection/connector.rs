//! Connector worker: one outbound connection attempt
//!
//! The attempt runs once in its own task: normal open, then exactly one
//! fallback open if the normal path fails. Cancellation (a superseding
//! `connect`, `stop`, or the handle being dropped) aborts whichever open is
//! in flight and the worker exits without touching the manager's state.

use super::cancel::{CancelSignal, Cancelled};
use super::listener::LinkListener;
use super::manager::Shared;
use crate::transport::{BoxedStream, RfcommPlatform};
use link_shared::{LinkError, OpenStrategy, RemoteEndpoint};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Manager-held handle to a running connector
pub(crate) struct ConnectorHandle {
    id: u64,
    endpoint: RemoteEndpoint,
    cancel: CancelSignal,
    _task: JoinHandle<()>,
}

impl ConnectorHandle {
    /// Spawn a connector task for `endpoint`
    pub fn spawn(shared: Arc<Shared>, id: u64, endpoint: RemoteEndpoint) -> Self {
        let cancel = CancelSignal::new();
        let cancelled = cancel.subscribe();
        let task = tokio::spawn(run(shared, id, endpoint.clone(), cancelled));

        Self {
            id,
            endpoint,
            cancel,
            _task: task,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Abort the attempt; the pending open fails with the cancellation
    pub fn cancel(&self) {
        debug!("[CONNECT] Cancelling attempt {} to {}", self.id, self.endpoint);
        self.cancel.cancel();
    }
}

/// Outcome of the open sequence
pub(crate) enum Attempt {
    Opened(BoxedStream),
    Failed,
    Cancelled,
}

async fn run(shared: Arc<Shared>, id: u64, endpoint: RemoteEndpoint, mut cancelled: Cancelled) {
    info!("[CONNECT] BEGIN attempt {} to {}", id, endpoint);

    // Always cancel discovery because it will slow down a connection
    shared.platform().cancel_discovery();

    let attempt = open_with_fallback(
        shared.platform(),
        shared.listener(),
        shared.connect_timeout(),
        &endpoint,
        &mut cancelled,
    )
    .await;

    match attempt {
        Attempt::Opened(stream) => promote_or_close(&shared, id, &endpoint, stream).await,
        Attempt::Failed => shared.connection_failed(id),
        Attempt::Cancelled => debug!("[CONNECT] Attempt {} cancelled", id),
    }
}

/// Hand an opened transport to the manager, closing it if the attempt was superseded
async fn promote_or_close(
    shared: &Arc<Shared>,
    id: u64,
    endpoint: &RemoteEndpoint,
    stream: BoxedStream,
) {
    if let Some(stale) = shared.connection_success(id, endpoint, stream) {
        debug!("[CONNECT] Attempt {} superseded after open, closing", id);
        close_stream(stale, shared.listener()).await;
    }
}

/// Try the normal open, then the fallback
pub(crate) async fn open_with_fallback(
    platform: &dyn RfcommPlatform,
    listener: &dyn LinkListener,
    connect_timeout: Option<Duration>,
    endpoint: &RemoteEndpoint,
    cancelled: &mut Cancelled,
) -> Attempt {
    for strategy in [OpenStrategy::Normal, OpenStrategy::Fallback] {
        if strategy == OpenStrategy::Fallback {
            info!("[CONNECT] Trying fallback...");
        }

        let result = tokio::select! {
            biased;
            _ = cancelled.wait() => return Attempt::Cancelled,
            result = open_once(platform, endpoint, strategy, connect_timeout) => result,
        };

        match result {
            Ok(stream) => {
                info!("[CONNECT] Connected to {} ({} open)", endpoint, strategy);
                return Attempt::Opened(stream);
            }
            Err(e) => {
                if strategy == OpenStrategy::Normal {
                    warn!("[CONNECT] Normal open to {} failed: {}", endpoint, e);
                } else {
                    error!("[CONNECT] Couldn't establish a connection to {}: {}", endpoint, e);
                }
                listener.on_error(LinkError::open(endpoint.address.clone(), strategy, e));
            }
        }
    }

    Attempt::Failed
}

async fn open_once(
    platform: &dyn RfcommPlatform,
    endpoint: &RemoteEndpoint,
    strategy: OpenStrategy,
    connect_timeout: Option<Duration>,
) -> io::Result<BoxedStream> {
    let open = async {
        match strategy {
            OpenStrategy::Normal => platform.open_normal(endpoint).await,
            OpenStrategy::Fallback => platform.open_fallback(endpoint).await,
        }
    };

    match connect_timeout {
        Some(limit) => timeout(limit, open).await.unwrap_or_else(|_| {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("open timed out after {:?}", limit),
            ))
        }),
        None => open.await,
    }
}

/// Close a transport that will never be promoted to a session
async fn close_stream(mut stream: BoxedStream, listener: &dyn LinkListener) {
    if let Err(e) = stream.shutdown().await {
        error!("[CONNECT] unable to close() socket: {}", e);
        listener.on_error(LinkError::Close { source: e });
    }
}
