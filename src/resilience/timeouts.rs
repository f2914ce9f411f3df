//! Bounded-wait wrappers.
//!
//! # Responsibilities
//! - Give blocking-style ergonomics on non-blocking sockets without a second thread
//! - Compose the direct driver with a single-connection readiness wait
//! - Enforce an absolute deadline across all retries
//!
//! # Design Decisions
//! - The deadline is an explicit parameter; there is no implicit default
//! - Zero remaining budget before a wait is a timeout, even if the socket
//!   might already be ready
//! - Timeout leaves the connection intact; a retry with a fresh deadline is valid
//! - Pending bookkeeping stays internal: callers only see progress or an error

use std::iter;
use std::time::{Duration, Instant};

use crate::engine::TlsSession;
use crate::error::{MuxError, MuxResult};
use crate::mux::aggregator::{populate_wait_set, retry_mask, Multiplexed};
use crate::mux::wait::ReadinessWait;
use crate::net::connection::{Connection, Socket};
use crate::net::driver::Step;

/// Absolute deadline `timeout` from now.
pub fn deadline_after(timeout: Duration) -> Instant {
    Instant::now() + timeout
}

/// Run `attempt` until it makes progress, fails, or `deadline` passes.
fn retry_until<S, E, W, T, F>(
    conn: &mut Connection<S, E>,
    waiter: &mut W,
    deadline: Instant,
    mut attempt: F,
) -> MuxResult<T>
where
    S: Socket,
    E: TlsSession,
    W: ReadinessWait + ?Sized,
    F: FnMut(&mut Connection<S, E>) -> MuxResult<Step<T>>,
{
    loop {
        if let Step::Progress(value) = attempt(conn)? {
            return Ok(value);
        }
        wait_until_eligible(conn, waiter, deadline)?;
    }
}

/// Wait until the wait reports readiness one of the connection's blocked
/// operations is pending on.
fn wait_until_eligible<S, E, W>(conn: &Connection<S, E>, waiter: &mut W, deadline: Instant) -> MuxResult<()>
where
    S: Socket,
    E: TlsSession,
    W: ReadinessWait + ?Sized,
{
    let set = populate_wait_set(iter::once(conn));
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::debug!(connection_id = %conn.id(), "Deadline reached before wait");
            return Err(MuxError::Timeout);
        }

        let result = waiter.wait(&set, Some(remaining)).map_err(MuxError::Wait)?;
        if result.is_empty() {
            tracing::debug!(connection_id = %conn.id(), "Wait timed out");
            return Err(MuxError::Timeout);
        }

        let mask = retry_mask(conn.raw_fd(), conn.pending(), &result);
        if !mask.is_empty() {
            tracing::trace!(connection_id = %conn.id(), retry = ?mask, "Wait completed");
            return Ok(());
        }
        tracing::trace!(connection_id = %conn.id(), "Readiness not relevant to pending ops, waiting again");
    }
}

/// Complete the handshake for the connection's role before `deadline`.
pub fn handshake_with_timeout<S, E, W>(
    conn: &mut Connection<S, E>,
    waiter: &mut W,
    deadline: Instant,
) -> MuxResult<()>
where
    S: Socket,
    E: TlsSession,
    W: ReadinessWait + ?Sized,
{
    retry_until(conn, waiter, deadline, |c| c.handshake_step())
}

/// Receive at least one byte into `buf` before `deadline`.
pub fn recv_with_timeout<S, E, W>(
    conn: &mut Connection<S, E>,
    waiter: &mut W,
    buf: &mut [u8],
    deadline: Instant,
) -> MuxResult<usize>
where
    S: Socket,
    E: TlsSession,
    W: ReadinessWait + ?Sized,
{
    retry_until(conn, waiter, deadline, |c| c.recv_step(buf))
}

/// Send a prefix of `buf` before `deadline`; returns how many bytes went out.
pub fn send_with_timeout<S, E, W>(
    conn: &mut Connection<S, E>,
    waiter: &mut W,
    buf: &[u8],
    deadline: Instant,
) -> MuxResult<usize>
where
    S: Socket,
    E: TlsSession,
    W: ReadinessWait + ?Sized,
{
    retry_until(conn, waiter, deadline, |c| c.send_step(buf))
}

/// Send all of `buf` before `deadline`.
pub fn send_all_with_timeout<S, E, W>(
    conn: &mut Connection<S, E>,
    waiter: &mut W,
    buf: &[u8],
    deadline: Instant,
) -> MuxResult<()>
where
    S: Socket,
    E: TlsSession,
    W: ReadinessWait + ?Sized,
{
    let mut sent = 0;
    while sent < buf.len() {
        sent += send_with_timeout(conn, waiter, &buf[sent..], deadline)?;
    }
    Ok(())
}
