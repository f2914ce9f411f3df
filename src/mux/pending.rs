//! Per-connection readiness bookkeeping.
//!
//! The operation set is closed, so the table is a fixed record with one
//! entry per [`Op`] rather than a map.

use std::fmt;

/// A logical operation that can block on socket readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Server-side handshake.
    Accept,
    /// Client-side handshake.
    Connect,
    Send,
    Recv,
}

impl Op {
    pub const ALL: [Op; 4] = [Op::Accept, Op::Connect, Op::Send, Op::Recv];
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Accept => "accept",
            Op::Connect => "connect",
            Op::Send => "send",
            Op::Recv => "recv",
        };
        f.write_str(name)
    }
}

/// Which socket readiness a blocked operation is waiting for.
///
/// The direction comes from the record layer, so a `Send` may need
/// readability and a `Recv` may need writability.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub needs_read: bool,
    pub needs_write: bool,
}

impl Readiness {
    pub const READ: Readiness = Readiness {
        needs_read: true,
        needs_write: false,
    };

    pub const WRITE: Readiness = Readiness {
        needs_read: false,
        needs_write: true,
    };

    pub fn is_blocked(&self) -> bool {
        self.needs_read || self.needs_write
    }
}

/// Readiness state of the four operations of one connection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PendingTable {
    accept: Readiness,
    connect: Readiness,
    send: Readiness,
    recv: Readiness,
}

impl PendingTable {
    pub fn get(&self, op: Op) -> Readiness {
        match op {
            Op::Accept => self.accept,
            Op::Connect => self.connect,
            Op::Send => self.send,
            Op::Recv => self.recv,
        }
    }

    fn slot(&mut self, op: Op) -> &mut Readiness {
        match op {
            Op::Accept => &mut self.accept,
            Op::Connect => &mut self.connect,
            Op::Send => &mut self.send,
            Op::Recv => &mut self.recv,
        }
    }

    pub(crate) fn set(&mut self, op: Op, readiness: Readiness) {
        *self.slot(op) = readiness;
    }

    pub(crate) fn clear(&mut self, op: Op) {
        *self.slot(op) = Readiness::default();
    }

    pub(crate) fn clear_all(&mut self) {
        *self = PendingTable::default();
    }

    /// True when no operation is blocked.
    pub fn is_idle(&self) -> bool {
        Op::ALL.iter().all(|op| !self.get(*op).is_blocked())
    }

    /// True when any operation waits for readability.
    pub fn wants_read(&self) -> bool {
        Op::ALL.iter().any(|op| self.get(*op).needs_read)
    }

    /// True when any operation waits for writability.
    pub fn wants_write(&self) -> bool {
        Op::ALL.iter().any(|op| self.get(*op).needs_write)
    }

    /// Operations currently blocked.
    pub fn blocked_ops(&self) -> impl Iterator<Item = Op> + '_ {
        Op::ALL.into_iter().filter(|op| self.get(*op).is_blocked())
    }
}
