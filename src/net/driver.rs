//! Direct operation driver.
//!
//! Each operation makes exactly one attempt against the engine and returns
//! immediately:
//!
//! ```text
//! Progress      → clear pending[op], return the result
//! WantRead/Write → pending[op] = direction, return RetryAfterWait
//! Fatal         → clear every pending entry, return MuxError::Fatal
//! ```
//!
//! The pending entry for an operation is cleared before the attempt, so a
//! retry that blocks again only reflects the direction of the latest attempt.

use crate::engine::{EngineStatus, TlsSession};
use crate::error::{MuxError, MuxResult};
use crate::mux::pending::{Op, Readiness};
use crate::net::connection::{Connection, Role, Socket};

/// Outcome of a direct operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<T> {
    /// The operation completed with this result.
    Progress(T),
    /// The socket was not ready; wait on the connection's pending flags and retry.
    RetryAfterWait,
}

impl<T> Step<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Step::Progress(_))
    }
}

impl<S: Socket, E: TlsSession> Connection<S, E> {
    /// Server handshake attempt.
    pub fn accept_step(&mut self) -> MuxResult<Step<()>> {
        if self.role != Role::Server {
            return Err(MuxError::InvalidState {
                op: Op::Accept,
                reason: "connection is not in the server role",
            });
        }
        self.drive_handshake(Op::Accept)
    }

    /// Client handshake attempt.
    pub fn connect_step(&mut self) -> MuxResult<Step<()>> {
        if self.role != Role::Client {
            return Err(MuxError::InvalidState {
                op: Op::Connect,
                reason: "connection is not in the client role",
            });
        }
        self.drive_handshake(Op::Connect)
    }

    /// Handshake attempt for whichever role this connection has.
    pub fn handshake_step(&mut self) -> MuxResult<Step<()>> {
        match self.role {
            Role::Server => self.accept_step(),
            Role::Client => self.connect_step(),
        }
    }

    /// Transmit a prefix of `buf`.
    ///
    /// After `RetryAfterWait` the retry must pass the same bytes: the engine
    /// may already hold a prefix of them.
    pub fn send_step(&mut self, buf: &[u8]) -> MuxResult<Step<usize>> {
        self.require_established(Op::Send)?;
        if buf.is_empty() {
            return Ok(Step::Progress(0));
        }
        self.pending.clear(Op::Send);
        let status = self.session.write_attempt(&mut self.socket, buf);
        self.settle(Op::Send, status)
    }

    /// Receive up to `buf.len()` decrypted bytes.
    pub fn recv_step(&mut self, buf: &mut [u8]) -> MuxResult<Step<usize>> {
        self.require_established(Op::Recv)?;
        if buf.is_empty() {
            return Ok(Step::Progress(0));
        }
        self.pending.clear(Op::Recv);
        let status = self.session.read_attempt(&mut self.socket, buf);
        self.settle(Op::Recv, status)
    }

    fn drive_handshake(&mut self, op: Op) -> MuxResult<Step<()>> {
        if self.established {
            return Ok(Step::Progress(()));
        }
        self.pending.clear(op);
        let status = self.session.handshake_attempt(&mut self.socket);
        let step = self.settle(op, status)?;
        if step.is_ready() {
            self.established = true;
            tracing::debug!(connection_id = %self.id, op = %op, "Handshake complete");
        }
        Ok(step)
    }

    fn require_established(&self, op: Op) -> MuxResult<()> {
        if self.established {
            Ok(())
        } else {
            Err(MuxError::InvalidState {
                op,
                reason: "handshake not complete",
            })
        }
    }

    fn settle<T>(&mut self, op: Op, status: EngineStatus<T>) -> MuxResult<Step<T>> {
        match status {
            EngineStatus::Progress(v) => Ok(Step::Progress(v)),
            EngineStatus::WantRead => {
                self.pending.set(op, Readiness::READ);
                tracing::trace!(connection_id = %self.id, op = %op, "Blocked until readable");
                Ok(Step::RetryAfterWait)
            }
            EngineStatus::WantWrite => {
                self.pending.set(op, Readiness::WRITE);
                tracing::trace!(connection_id = %self.id, op = %op, "Blocked until writable");
                Ok(Step::RetryAfterWait)
            }
            EngineStatus::Fatal(kind, message) => {
                self.pending.clear_all();
                tracing::warn!(
                    connection_id = %self.id,
                    op = %op,
                    kind = %kind,
                    error = %message,
                    "TLS operation failed"
                );
                Err(MuxError::fatal(kind, message))
            }
        }
    }
}
