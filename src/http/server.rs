//! Multiplexed HTTPS responder.
//!
//! # Responsibilities
//! - Accept TCP connections under a `max_connections` cap
//! - Drive every connection's handshake, request read and response write
//!   from one thread, with one shared readiness wait per iteration
//! - Drop connections that stay idle past their deadline
//! - Stop when the shutdown flag is raised
//!
//! # Design Decisions
//! - The listener joins the wait set only while a slot is free
//! - A connection whose pending table is idle has never blocked yet and is
//!   attempted without waiting
//! - Each connection is advanced until it blocks, so buffered plaintext is
//!   never stranded behind a wait
//! - Every response is the same fixed page; the request is only framed,
//!   never parsed

use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::MuxConfig;
use crate::engine::RustlsSession;
use crate::error::MuxResult;
use crate::lifecycle::Shutdown;
use crate::mux::aggregator::{dispatch_ready, populate_wait_set, Interest, RetryMask, WaitResult};
use crate::mux::wait::{PollWaiter, ReadinessWait};
use crate::net::connection::{Connection, Role};
use crate::net::driver::Step;
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::tls::TlsContext;
use crate::resilience::timeouts::deadline_after;

/// Body sent for every request.
pub const RESPONSE: &[u8] =
    b"HTTP/1.0 200 OK\r\nContent-Type: text/html\r\n\r\n<html><head></head><body>simple server</body></html>\r\n";

const REQUEST_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("responder needs a server TLS context")]
    NotServerContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Handshake,
    ReadRequest,
    WriteResponse,
}

/// Why a connection left the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Blocked,
    Served,
    RequestTooLarge,
}

/// One client connection and where it is in the exchange.
struct Exchange {
    conn: Connection<TcpStream, RustlsSession>,
    peer: SocketAddr,
    phase: Phase,
    request: Vec<u8>,
    written: usize,
    idle_deadline: Instant,
    _permit: ConnectionPermit,
}

impl Exchange {
    /// Run the exchange until it blocks, finishes, or fails.
    fn advance(&mut self, max_request_bytes: usize, idle: Duration) -> MuxResult<Outcome> {
        loop {
            match self.phase {
                Phase::Handshake => match self.conn.accept_step()? {
                    Step::Progress(()) => self.phase = Phase::ReadRequest,
                    Step::RetryAfterWait => return Ok(Outcome::Blocked),
                },
                Phase::ReadRequest => {
                    let mut buf = [0u8; 1024];
                    match self.conn.recv_step(&mut buf)? {
                        Step::Progress(n) => {
                            self.request.extend_from_slice(&buf[..n]);
                            if has_terminator(&self.request) {
                                tracing::debug!(
                                    connection_id = %self.conn.id(),
                                    request_bytes = self.request.len(),
                                    "Request received"
                                );
                                self.phase = Phase::WriteResponse;
                            } else if self.request.len() > max_request_bytes {
                                return Ok(Outcome::RequestTooLarge);
                            }
                        }
                        Step::RetryAfterWait => return Ok(Outcome::Blocked),
                    }
                }
                Phase::WriteResponse => match self.conn.send_step(&RESPONSE[self.written..])? {
                    Step::Progress(n) => {
                        self.written += n;
                        if self.written == RESPONSE.len() {
                            return Ok(Outcome::Served);
                        }
                    }
                    Step::RetryAfterWait => return Ok(Outcome::Blocked),
                },
            }
            self.idle_deadline = deadline_after(idle);
        }
    }
}

fn has_terminator(request: &[u8]) -> bool {
    request.windows(REQUEST_TERMINATOR.len()).any(|w| w == REQUEST_TERMINATOR)
}

/// Single-threaded HTTPS responder.
pub struct HttpServer {
    listener: Listener,
    tls: TlsContext,
    config: MuxConfig,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Bind the listener from `config.server`.
    pub fn bind(config: MuxConfig, tls: TlsContext, shutdown: Shutdown) -> Result<Self, ServerError> {
        if tls.role() != Role::Server {
            return Err(ServerError::NotServerContext);
        }
        let listener = Listener::bind(&config.server)?;
        Ok(Self {
            listener,
            tls,
            config,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until shutdown is triggered, then close every connection.
    pub fn run(self) {
        let mut waiter = PollWaiter::new();
        self.run_with(&mut waiter);
    }

    /// As [`HttpServer::run`], waiting through `waiter`.
    pub fn run_with<W: ReadinessWait + ?Sized>(self, waiter: &mut W) {
        let poll_interval = Duration::from_millis(self.config.server.poll_interval_ms);
        let idle = self.config.timeouts.idle();
        let max_request_bytes = self.config.server.max_request_bytes;
        let mut exchanges: Vec<Exchange> = Vec::new();

        tracing::info!(
            address = ?self.listener.local_addr().ok(),
            "HTTPS responder starting"
        );

        while !self.shutdown.is_triggered() {
            let mut set = populate_wait_set(exchanges.iter().map(|e| &e.conn));
            let listening = self.listener.has_capacity();
            if listening {
                set.insert(self.listener.as_raw_fd(), Interest::READ);
            }

            let now = Instant::now();
            let timeout = exchanges
                .iter()
                .map(|e| e.idle_deadline.saturating_duration_since(now))
                .fold(poll_interval, Duration::min);

            let result = match waiter.wait(&set, Some(timeout)) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(error = %e, "Wait failed, retrying every pending operation");
                    WaitResult::failed()
                }
            };

            let masks = dispatch_ready(exchanges.iter().map(|e| &e.conn), &result);
            let now = Instant::now();
            let mut survivors = Vec::with_capacity(exchanges.len());
            for (exchange, mask) in exchanges.drain(..).zip(masks) {
                if mask.is_empty() && !exchange.conn.pending().is_idle() {
                    if now >= exchange.idle_deadline {
                        tracing::info!(
                            connection_id = %exchange.conn.id(),
                            peer_addr = %exchange.peer,
                            "Idle timeout"
                        );
                        exchange.conn.close();
                    } else {
                        survivors.push(exchange);
                    }
                    continue;
                }
                if let Some(exchange) = self.step(exchange, mask, max_request_bytes, idle) {
                    survivors.push(exchange);
                }
            }
            exchanges = survivors;

            if listening && (result.failed || result.is_readable(self.listener.as_raw_fd())) {
                self.accept_ready(&mut exchanges, max_request_bytes, idle);
            }
        }

        tracing::info!(open_connections = exchanges.len(), "HTTPS responder stopping");
        for exchange in exchanges {
            exchange.conn.close();
        }
    }

    /// Advance one exchange; `None` once it is finished or failed.
    fn step(&self, mut exchange: Exchange, mask: RetryMask, max_request_bytes: usize, idle: Duration) -> Option<Exchange> {
        if mask.is_forced() {
            tracing::debug!(connection_id = %exchange.conn.id(), "Forced retry");
        }
        match exchange.advance(max_request_bytes, idle) {
            Ok(Outcome::Blocked) => Some(exchange),
            Ok(Outcome::Served) => {
                tracing::info!(
                    connection_id = %exchange.conn.id(),
                    peer_addr = %exchange.peer,
                    "Response sent"
                );
                exchange.conn.close();
                None
            }
            Ok(Outcome::RequestTooLarge) => {
                tracing::warn!(
                    connection_id = %exchange.conn.id(),
                    limit = max_request_bytes,
                    "Request too large"
                );
                exchange.conn.close();
                None
            }
            Err(e) => {
                tracing::debug!(
                    connection_id = %exchange.conn.id(),
                    peer_addr = %exchange.peer,
                    error = %e,
                    "Connection dropped"
                );
                None
            }
        }
    }

    /// Accept everything queued while slots remain, attempting each new
    /// handshake right away.
    fn accept_ready(&self, exchanges: &mut Vec<Exchange>, max_request_bytes: usize, idle: Duration) {
        loop {
            let (stream, peer, permit) = match self.listener.try_accept() {
                Ok(Some(accepted)) => accepted,
                Ok(None) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    return;
                }
            };
            let conn = match self.tls.accept(stream) {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(peer_addr = %peer, error = %e, "TLS setup failed");
                    continue;
                }
            };
            let exchange = Exchange {
                conn,
                peer,
                phase: Phase::Handshake,
                request: Vec::new(),
                written: 0,
                idle_deadline: deadline_after(idle),
                _permit: permit,
            };
            if let Some(exchange) = self.step(exchange, RetryMask::empty(), max_request_bytes, idle) {
                exchanges.push(exchange);
            }
        }
    }
}
