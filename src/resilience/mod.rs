//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Blocking-style call:
//!     → timeouts.rs (driver attempt → single-connection wait → retry)
//!     → until progress, fatal error, or deadline
//! ```
//!
//! # Design Decisions
//! - Timeouts are explicit; every bounded call takes an absolute deadline
//! - Only these wrappers retry; the driver never does
//! - Timeout errors are distinct from fatal errors

pub mod timeouts;

pub use timeouts::{
    deadline_after, handshake_with_timeout, recv_with_timeout, send_all_with_timeout, send_with_timeout,
};
