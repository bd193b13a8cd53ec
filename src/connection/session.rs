//! Session worker: one established connection
//!
//! The read loop runs in its own task and delivers decoded text in read
//! order. Writes come from any caller and go straight to the transport's
//! write half. Closing the session unblocks both.

use super::cancel::CancelSignal;
use super::listener::LinkListener;
use super::manager::Shared;
use crate::transport::BoxedStream;
use link_shared::{LinkError, RemoteEndpoint, StreamOp, Utf8ChunkDecoder};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Upper bound on the graceful shutdown of the write half
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Manager-held handle to a running session
pub(crate) struct SessionHandle {
    id: u64,
    endpoint: RemoteEndpoint,
    /// Taken exactly once, when the session closes
    writer: Mutex<Option<WriteHalf<BoxedStream>>>,
    close: CancelSignal,
    listener: Arc<dyn LinkListener>,
}

impl SessionHandle {
    /// Split an opened transport into a session handle and its read half
    pub fn new(
        id: u64,
        endpoint: RemoteEndpoint,
        stream: BoxedStream,
        listener: Arc<dyn LinkListener>,
    ) -> (Arc<Self>, ReadHalf<BoxedStream>) {
        debug!("[SESSION] create session {} for {}", id, endpoint);
        let (reader, writer) = tokio::io::split(stream);

        let handle = Arc::new(Self {
            id,
            endpoint,
            writer: Mutex::new(Some(writer)),
            close: CancelSignal::new(),
            listener,
        });
        (handle, reader)
    }

    /// Start the read loop
    pub fn spawn_reader(
        self: &Arc<Self>,
        shared: Arc<Shared>,
        reader: ReadHalf<BoxedStream>,
        buffer_size: usize,
    ) {
        tokio::spawn(read_loop(shared, self.clone(), reader, buffer_size));
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Close the transport; a pending read or write fails promptly
    pub fn cancel(&self) {
        debug!("[SESSION] Cancelling session {} with {}", self.id, self.endpoint);
        self.close.cancel();
    }

    /// Write the bytes in full; failures go to the listener only
    pub async fn write(&self, bytes: &[u8]) {
        debug!("[SESSION] Write {} bytes to {}", bytes.len(), self.endpoint);
        if let Err(e) = self.try_write(bytes).await {
            error!("[SESSION] Exception during write: {}", e);
            self.listener.on_error(LinkError::Stream {
                op: StreamOp::Write,
                source: e,
            });
        }
    }

    async fn try_write(&self, bytes: &[u8]) -> io::Result<()> {
        if self.close.is_cancelled() {
            return Err(closed_error());
        }
        let mut closed = self.close.subscribe();

        tokio::select! {
            biased;
            _ = closed.wait() => Err(closed_error()),
            result = self.write_locked(bytes) => result,
        }
    }

    async fn write_locked(&self, bytes: &[u8]) -> io::Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(closed_error)?;
        writer.write_all(bytes).await?;
        writer.flush().await
    }

    /// Mark the transport closed and shut the write half down once
    async fn close(&self) {
        self.close.cancel();

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            match timeout(CLOSE_TIMEOUT, writer.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("[SESSION] close() of socket failed: {}", e),
                Err(_) => warn!("[SESSION] close() of socket timed out"),
            }
        }
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "transport closed")
}

async fn read_loop(
    shared: Arc<Shared>,
    session: Arc<SessionHandle>,
    mut reader: ReadHalf<BoxedStream>,
    buffer_size: usize,
) {
    info!("[SESSION] BEGIN session {} with {}", session.id, session.endpoint);

    let listener = shared.listener();
    let mut closed = session.close.subscribe();
    let mut buffer = vec![0u8; buffer_size];
    let mut decoder = Utf8ChunkDecoder::new();

    // Keep listening while connected
    let cause = loop {
        let result = tokio::select! {
            biased;
            _ = closed.wait() => Err(closed_error()),
            result = reader.read(&mut buffer) => result,
        };

        match result {
            Ok(0) => {
                break io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed by peer");
            }
            Ok(n) => {
                let text = decoder.decode(&buffer[..n]);
                if !text.is_empty() {
                    listener.on_data(&text);
                }
            }
            Err(e) => break e,
        }
    };

    if let Some(rest) = decoder.finish() {
        listener.on_data(&rest);
    }

    warn!("[SESSION] Session {} disconnected: {}", session.id, cause);
    drop(reader);
    session.close().await;

    listener.on_error(LinkError::Stream {
        op: StreamOp::Read,
        source: cause,
    });
    shared.connection_lost(session.id);
}
