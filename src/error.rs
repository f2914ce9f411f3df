//! Error taxonomy for TLS operations.
//!
//! Would-block is not an error here: the driver reports it as
//! [`Step::RetryAfterWait`](crate::net::driver::Step). Everything in
//! [`MuxError`] is either terminal for the connection (`Fatal`), a deadline
//! that expired while still blocked (`Timeout`), or caller misuse.

use std::fmt;
use thiserror::Error;

use crate::mux::pending::Op;

/// Why a connection can no longer make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalKind {
    /// Handshake rejected (bad certificate, no common parameters, alert).
    HandshakeFailed,
    /// Malformed or unexpected record after the handshake.
    ProtocolError,
    /// Peer closed or reset the connection.
    PeerReset,
    /// Any other socket-level failure.
    SocketError,
}

impl fmt::Display for FatalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FatalKind::HandshakeFailed => "handshake failed",
            FatalKind::ProtocolError => "protocol error",
            FatalKind::PeerReset => "peer reset",
            FatalKind::SocketError => "socket error",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the driver, the aggregator and the bounded-wait wrappers.
#[derive(Debug, Error)]
pub enum MuxError {
    /// The connection must be torn down; retrying is never valid.
    #[error("{kind}: {message}")]
    Fatal { kind: FatalKind, message: String },

    /// Deadline passed while the operation was still blocked. The connection
    /// is intact and may be retried with a fresh deadline.
    #[error("deadline exceeded while waiting for socket readiness")]
    Timeout,

    /// Operation attempted in a state where it cannot run.
    #[error("{op} is not valid here: {reason}")]
    InvalidState { op: Op, reason: &'static str },

    /// The readiness wait itself failed.
    #[error("readiness wait failed: {0}")]
    Wait(#[source] std::io::Error),
}

impl MuxError {
    pub(crate) fn fatal(kind: FatalKind, message: impl Into<String>) -> Self {
        MuxError::Fatal {
            kind,
            message: message.into(),
        }
    }

    /// True when the connection has to be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MuxError::Fatal { .. })
    }

    /// The fatal cause, if this is a fatal error.
    pub fn fatal_kind(&self) -> Option<FatalKind> {
        match self {
            MuxError::Fatal { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type for TLS multiplexer operations.
pub type MuxResult<T> = Result<T, MuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MuxError::fatal(FatalKind::PeerReset, "close_notify received");
        assert_eq!(err.to_string(), "peer reset: close_notify received");
        assert!(err.is_fatal());
        assert_eq!(err.fatal_kind(), Some(FatalKind::PeerReset));

        let err = MuxError::InvalidState {
            op: Op::Recv,
            reason: "handshake not complete",
        };
        assert!(err.to_string().contains("recv"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_timeout_is_not_fatal() {
        assert!(!MuxError::Timeout.is_fatal());
        assert_eq!(MuxError::Timeout.fatal_kind(), None);
    }
}
