//! Error taxonomy reported to link listeners
//!
//! None of these are returned to the caller of a link operation; workers
//! hand them to `on_error` and follow up with a connection-failed or
//! connection-lost notification where the error is fatal.

use std::fmt;
use std::io;
use thiserror::Error;

/// Which open strategy produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStrategy {
    /// Service lookup by UUID
    Normal,
    /// Alternate channel open tried after the normal path failed
    Fallback,
}

impl fmt::Display for OpenStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenStrategy::Normal => write!(f, "normal"),
            OpenStrategy::Fallback => write!(f, "fallback"),
        }
    }
}

/// Direction of a failed stream operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOp {
    Read,
    Write,
}

impl fmt::Display for StreamOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamOp::Read => write!(f, "read"),
            StreamOp::Write => write!(f, "write"),
        }
    }
}

/// Errors reported by the connection workers
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("{strategy} open to {endpoint} failed: {source}")]
    Open {
        endpoint: String,
        strategy: OpenStrategy,
        #[source]
        source: io::Error,
    },

    #[error("stream {op} failed: {source}")]
    Stream {
        op: StreamOp,
        #[source]
        source: io::Error,
    },

    #[error("transport close failed: {source}")]
    Close {
        #[source]
        source: io::Error,
    },
}

impl LinkError {
    /// Build an open failure for the given strategy
    pub fn open(endpoint: impl Into<String>, strategy: OpenStrategy, source: io::Error) -> Self {
        LinkError::Open {
            endpoint: endpoint.into(),
            strategy,
            source,
        }
    }

    /// Underlying I/O error kind
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            LinkError::Open { source, .. }
            | LinkError::Stream { source, .. }
            | LinkError::Close { source } => source.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_open_error_message() {
        let err = LinkError::open(
            "00:11:22:33:44:55",
            OpenStrategy::Fallback,
            io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        );
        assert_eq!(
            err.to_string(),
            "fallback open to 00:11:22:33:44:55 failed: refused"
        );
        assert!(err.source().is_some());
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }
}
