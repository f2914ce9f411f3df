//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! driver / aggregator / wrappers / server
//!     → tracing events (connection_id, op, kind fields)
//!     → logging.rs (EnvFilter + fmt layer, plain or JSON)
//!     → stdout
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Connection ID flows through every event
//! - Would-block is `trace`, fatal is `warn`

pub mod logging;

pub use logging::init_logging;
