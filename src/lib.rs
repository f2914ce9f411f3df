//! Non-blocking TLS operation multiplexer.
//!
//! Drives TLS handshakes, reads and writes on non-blocking sockets one
//! attempt at a time, records which socket readiness each blocked
//! operation needs, and folds that into a single shared wait.

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod mux;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::schema::MuxConfig;
pub use error::{FatalKind, MuxError, MuxResult};
pub use lifecycle::Shutdown;
pub use mux::{dispatch_ready, populate_wait_set, Op, PollWaiter, ReadinessWait, RetryMask, WaitResult, WaitSet};
pub use net::{Connection, Role, Step, TlsContext};
