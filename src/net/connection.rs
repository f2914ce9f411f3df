//! Connection state.
//!
//! # Responsibilities
//! - Own the socket and the per-connection TLS session
//! - Hold the pending readiness table for the four operations
//! - Generate unique connection IDs for tracing
//! - Tear down without blocking, even while operations are pending

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::TlsSession;
use crate::mux::aggregator::Multiplexed;
use crate::mux::pending::PendingTable;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Which side of the handshake this connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepted connection; handshakes with `accept`.
    Server,
    /// Dialed connection; handshakes with `connect`.
    Client,
}

/// A byte-stream socket that can be switched to non-blocking mode and waited on.
pub trait Socket: Read + Write + AsRawFd {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;
}

impl Socket for TcpStream {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }
}

impl Socket for UnixStream {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        UnixStream::set_nonblocking(self, nonblocking)
    }
}

/// A socket bound to a TLS role.
///
/// Driven by a single owner through `&mut self`; see [`crate::net::driver`]
/// for the operations.
#[derive(Debug)]
pub struct Connection<S, E> {
    pub(crate) id: ConnectionId,
    pub(crate) role: Role,
    pub(crate) socket: S,
    pub(crate) session: E,
    pub(crate) pending: PendingTable,
    pub(crate) established: bool,
}

impl<S: Socket, E: TlsSession> Connection<S, E> {
    /// Associate `socket` with a TLS session. The socket is switched to
    /// non-blocking mode.
    pub fn new(socket: S, session: E, role: Role) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        let conn = Self {
            id: ConnectionId::new(),
            role,
            socket,
            session,
            pending: PendingTable::default(),
            established: false,
        };
        tracing::trace!(connection_id = %conn.id, role = ?role, "Connection created");
        Ok(conn)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// True once the handshake has completed.
    pub fn is_established(&self) -> bool {
        self.established
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn session(&self) -> &E {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut E {
        &mut self.session
    }

    /// Best-effort close-notify, then drop the socket.
    ///
    /// Never waits: if the socket cannot take the alert right now it is
    /// discarded.
    pub fn close(mut self) {
        self.pending.clear_all();
        self.session.shutdown(&mut self.socket);
        tracing::debug!(connection_id = %self.id, "Connection closed");
    }
}

impl<S: AsRawFd, E> Multiplexed for Connection<S, E> {
    fn raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    fn pending(&self) -> &PendingTable {
        &self.pending
    }
}
