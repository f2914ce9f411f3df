//! Readiness aggregation across connections.
//!
//! # Responsibilities
//! - Build the descriptor wait set from each connection's pending table
//! - Interpret a completed wait into per-connection retry masks
//!
//! # Design Decisions
//! - Wait sets are rebuilt from live connections every time, so a closed
//!   connection never lingers as a registration
//! - Dispatch reports eligibility only; the caller re-invokes the driver and
//!   decides the order (draining `recv` before `send` is a good default)
//! - A failed wait or an errored descriptor forces every pending operation of
//!   the affected connection, so the driver surfaces the real failure

use std::collections::BTreeSet;
use std::os::unix::io::RawFd;

use bitflags::bitflags;

use crate::mux::pending::{Op, PendingTable};

bitflags! {
    /// Socket readiness requested for a descriptor.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Interest: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
    }
}

bitflags! {
    /// Operations that may be retried after a wait.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RetryMask: u8 {
        const ACCEPT = 0b0_0001;
        const CONNECT = 0b0_0010;
        const SEND = 0b0_0100;
        const RECV = 0b0_1000;
        /// Retry regardless of readiness: the wait or the descriptor failed.
        const FORCED = 0b1_0000;
    }
}

impl RetryMask {
    pub fn for_op(op: Op) -> Self {
        match op {
            Op::Accept => RetryMask::ACCEPT,
            Op::Connect => RetryMask::CONNECT,
            Op::Send => RetryMask::SEND,
            Op::Recv => RetryMask::RECV,
        }
    }

    pub fn has_op(&self, op: Op) -> bool {
        self.contains(Self::for_op(op))
    }

    /// Eligible operations in `recv, send, accept, connect` order.
    pub fn ops(&self) -> impl Iterator<Item = Op> + '_ {
        [Op::Recv, Op::Send, Op::Accept, Op::Connect]
            .into_iter()
            .filter(|op| self.has_op(*op))
    }

    pub fn is_forced(&self) -> bool {
        self.contains(RetryMask::FORCED)
    }
}

/// Anything that can take part in a multiplexed wait.
pub trait Multiplexed {
    fn raw_fd(&self) -> RawFd;
    fn pending(&self) -> &PendingTable;
}

impl<T: Multiplexed + ?Sized> Multiplexed for &T {
    fn raw_fd(&self) -> RawFd {
        (**self).raw_fd()
    }

    fn pending(&self) -> &PendingTable {
        (**self).pending()
    }
}

impl<T: Multiplexed + ?Sized> Multiplexed for &mut T {
    fn raw_fd(&self) -> RawFd {
        (**self).raw_fd()
    }

    fn pending(&self) -> &PendingTable {
        (**self).pending()
    }
}

/// Descriptors to wait on, sorted by fd.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WaitSet {
    // keep sorted
    entries: Vec<(RawFd, Interest)>,
}

impl WaitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add interest for `fd`, merging with any interest already present.
    pub fn insert(&mut self, fd: RawFd, interest: Interest) {
        if interest.is_empty() {
            return;
        }
        match self.entries.binary_search_by_key(&fd, |(f, _)| *f) {
            Ok(i) => self.entries[i].1 |= interest,
            Err(i) => self.entries.insert(i, (fd, interest)),
        }
    }

    pub fn interest(&self, fd: RawFd) -> Interest {
        self.entries
            .binary_search_by_key(&fd, |(f, _)| *f)
            .map(|i| self.entries[i].1)
            .unwrap_or_default()
    }

    pub fn entries(&self) -> &[(RawFd, Interest)] {
        &self.entries
    }

    pub fn read_fds(&self) -> impl Iterator<Item = RawFd> + '_ {
        self.entries
            .iter()
            .filter(|(_, i)| i.contains(Interest::READ))
            .map(|(fd, _)| *fd)
    }

    pub fn write_fds(&self) -> impl Iterator<Item = RawFd> + '_ {
        self.entries
            .iter()
            .filter(|(_, i)| i.contains(Interest::WRITE))
            .map(|(fd, _)| *fd)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// What a completed wait reported.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WaitResult {
    pub readable: BTreeSet<RawFd>,
    pub writable: BTreeSet<RawFd>,
    /// Descriptors reported as errored, hung up or invalid.
    pub errored: BTreeSet<RawFd>,
    /// The wait as a whole failed.
    pub failed: bool,
}

impl WaitResult {
    /// A result meaning "the wait failed": every pending operation is forced.
    pub fn failed() -> Self {
        Self {
            failed: true,
            ..Self::default()
        }
    }

    pub fn with_readable(mut self, fd: RawFd) -> Self {
        self.readable.insert(fd);
        self
    }

    pub fn with_writable(mut self, fd: RawFd) -> Self {
        self.writable.insert(fd);
        self
    }

    pub fn with_errored(mut self, fd: RawFd) -> Self {
        self.errored.insert(fd);
        self
    }

    /// Nothing became ready: the wait timed out.
    pub fn is_empty(&self) -> bool {
        !self.failed && self.readable.is_empty() && self.writable.is_empty() && self.errored.is_empty()
    }

    pub fn is_readable(&self, fd: RawFd) -> bool {
        self.readable.contains(&fd)
    }

    pub fn is_writable(&self, fd: RawFd) -> bool {
        self.writable.contains(&fd)
    }
}

/// Interest needed by one pending table.
pub fn interest_of(pending: &PendingTable) -> Interest {
    let mut interest = Interest::empty();
    if pending.wants_read() {
        interest |= Interest::READ;
    }
    if pending.wants_write() {
        interest |= Interest::WRITE;
    }
    interest
}

/// Build the wait set for every connection with a blocked operation.
///
/// Idle connections contribute nothing. Calling this twice without a wait in
/// between yields the same set.
pub fn populate_wait_set<I>(conns: I) -> WaitSet
where
    I: IntoIterator,
    I::Item: Multiplexed,
{
    let mut set = WaitSet::new();
    for conn in conns {
        set.insert(conn.raw_fd(), interest_of(conn.pending()));
    }
    set
}

/// Retry mask for a single connection.
pub fn retry_mask(fd: RawFd, pending: &PendingTable, result: &WaitResult) -> RetryMask {
    let forced = result.failed || result.errored.contains(&fd);
    let readable = result.is_readable(fd);
    let writable = result.is_writable(fd);

    let mut mask = RetryMask::empty();
    for op in pending.blocked_ops() {
        let entry = pending.get(op);
        if forced || (entry.needs_read && readable) || (entry.needs_write && writable) {
            mask |= RetryMask::for_op(op);
        }
    }
    if forced && !mask.is_empty() {
        mask |= RetryMask::FORCED;
    }
    mask
}

/// One retry mask per connection, in input order.
///
/// An operation is eligible iff it is pending on a readiness the wait
/// reported. Operations without a pending entry are never eligible.
pub fn dispatch_ready<I>(conns: I, result: &WaitResult) -> Vec<RetryMask>
where
    I: IntoIterator,
    I::Item: Multiplexed,
{
    conns
        .into_iter()
        .map(|conn| retry_mask(conn.raw_fd(), conn.pending(), result))
        .collect()
}
