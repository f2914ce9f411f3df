//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() from any thread → server loop notices within one poll interval
//!     → stop accepting → close every connection → return
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → shutdown flag set from the handler
//! ```
//!
//! # Design Decisions
//! - Shutdown is cooperative; signal handlers are installed only on request
//! - Close is best-effort close-notify, never a blocking drain

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::install_signal_handlers;
