//! Demo HTTPS endpoints built on the multiplexer.
//!
//! # Data Flow
//! ```text
//! server.rs:
//!     Listener → TlsContext::accept → Exchange (handshake → read request → write page)
//!     all exchanges share one PollWaiter per loop iteration
//!
//! client.rs:
//!     TcpStream::connect → TlsContext::connect → bounded-wait wrappers
//!     → GET → read until the server closes
//! ```

pub mod client;
pub mod server;

pub use client::{fetch, FetchError, FetchReport};
pub use server::{HttpServer, ServerError, RESPONSE};
