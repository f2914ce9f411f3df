//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted or dialed TCP socket
//!     → listener.rs (non-blocking accept, connection limits)
//!     → tls.rs (context → per-connection session)
//!     → connection.rs (socket + session + pending table)
//!     → driver.rs (one engine attempt per call)
//!
//! Connection States:
//!     Created → Handshaking → Established → Closed
//! ```
//!
//! # Design Decisions
//! - Sockets are always non-blocking; waiting belongs to the caller
//! - A connection has exactly one owner, enforced through `&mut self`
//! - Close never blocks

pub mod connection;
pub mod driver;
pub mod listener;
pub mod tls;

pub use connection::{Connection, ConnectionId, Role, Socket};
pub use driver::Step;
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use tls::{TlsContext, TlsSetupError};
