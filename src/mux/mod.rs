//! Readiness multiplexing subsystem.
//!
//! # Data Flow
//! ```text
//! driver marks pending[op] on would-block
//!     → aggregator.rs (populate_wait_set: pending tables → WaitSet)
//!     → wait.rs (caller's event loop waits on the set)
//!     → aggregator.rs (dispatch_ready: WaitResult → RetryMask per connection)
//!     → caller re-invokes the driver for each eligible op
//! ```
//!
//! # Design Decisions
//! - Pending state is a fixed four-entry record per connection
//! - The aggregator never performs an operation, it only reports eligibility
//! - The wait primitive is a trait so any event loop can drive connections

pub mod aggregator;
pub mod pending;
pub mod wait;

pub use aggregator::{dispatch_ready, populate_wait_set, Interest, Multiplexed, RetryMask, WaitResult, WaitSet};
pub use pending::{Op, PendingTable, Readiness};
pub use wait::{PollWaiter, ReadinessWait};
