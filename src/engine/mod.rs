//! TLS engine contract.
//!
//! # Data Flow
//! ```text
//! driver (one attempt per call)
//!     → TlsSession::{handshake,write,read}_attempt(socket)
//!     → EngineStatus::{Progress, WantRead, WantWrite, Fatal}
//! ```
//!
//! # Design Decisions
//! - Every attempt returns immediately; a blocked socket surfaces as
//!   `WantRead`/`WantWrite`, never as a wait
//! - The engine owns the record layer; the socket is borrowed per attempt
//! - `shutdown` is best-effort and never reports failure

use std::io::{self, Read, Write};

use crate::error::FatalKind;

#[cfg(test)]
pub(crate) mod mock;
pub mod rustls;

pub use self::rustls::RustlsSession;

/// Result of a single engine attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus<T> {
    /// Bytes moved or handshake finished.
    Progress(T),
    /// The record layer needs the socket to become readable.
    WantRead,
    /// The record layer needs the socket to become writable.
    WantWrite,
    /// Non-recoverable failure with the engine-reported reason.
    Fatal(FatalKind, String),
}

/// Per-connection TLS session state driven one attempt at a time.
pub trait TlsSession {
    /// Advance the handshake as far as the socket allows.
    fn handshake_attempt<T: Read + Write>(&mut self, io: &mut T) -> EngineStatus<()>;

    /// Encrypt and transmit a prefix of `buf`.
    fn write_attempt<T: Read + Write>(&mut self, io: &mut T, buf: &[u8]) -> EngineStatus<usize>;

    /// Decrypt received data into `buf`.
    fn read_attempt<T: Read + Write>(&mut self, io: &mut T, buf: &mut [u8]) -> EngineStatus<usize>;

    /// Queue close-notify and make one non-blocking attempt to send it.
    fn shutdown<T: Read + Write>(&mut self, io: &mut T);

    fn is_handshaking(&self) -> bool;
}

/// Classify a socket error that is not `WouldBlock`.
pub(crate) fn fatal_from_io<T>(err: &io::Error) -> EngineStatus<T> {
    let kind = match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => FatalKind::PeerReset,
        _ => FatalKind::SocketError,
    };
    EngineStatus::Fatal(kind, err.to_string())
}
