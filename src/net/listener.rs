//! Non-blocking TCP listener with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept without blocking; the caller waits on [`Listener::raw_fd`]
//! - Enforce `max_connections` with a permit count
//!
//! # Design Decisions
//! - At capacity the listener is simply left out of the wait set; the kernel
//!   backlog absorbs the burst
//! - Permits release on drop, so a connection torn down on any path frees its slot

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::config::ServerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind: {0}")]
    Bind(#[source] io::Error),

    #[error("Failed to accept: {0}")]
    Accept(#[source] io::Error),
}

/// A bounded, non-blocking TCP listener.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    active: Arc<AtomicUsize>,
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub fn bind(config: &ServerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| ListenerError::Bind(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let listener = TcpListener::bind(addr).map_err(ListenerError::Bind)?;
        listener.set_nonblocking(true).map_err(ListenerError::Bind)?;

        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            active: Arc::new(AtomicUsize::new(0)),
            max_connections: config.max_connections,
        })
    }

    /// Accept one pending connection if a slot is free.
    ///
    /// Returns `Ok(None)` when at capacity or when nothing is queued. The
    /// permit must be held for the connection's lifetime.
    pub fn try_accept(&self) -> Result<Option<(TcpStream, SocketAddr, ConnectionPermit)>, ListenerError> {
        if !self.has_capacity() {
            return Ok(None);
        }

        let (stream, addr) = match self.inner.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(ListenerError::Accept(e)),
        };

        self.active.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.available_permits(),
            "Connection accepted"
        );

        let permit = ConnectionPermit {
            active: Arc::clone(&self.active),
        };
        Ok(Some((stream, addr, permit)))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// True while another connection may be accepted.
    pub fn has_capacity(&self) -> bool {
        self.available_permits() > 0
    }

    pub fn available_permits(&self) -> usize {
        self.max_connections.saturating_sub(self.active.load(Ordering::Acquire))
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

/// A connection slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct ConnectionPermit {
    active: Arc<AtomicUsize>,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback(max_connections: usize) -> Listener {
        let config = ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            max_connections,
            ..ServerConfig::default()
        };
        Listener::bind(&config).unwrap()
    }

    #[test]
    fn bad_address_fails_to_bind() {
        let config = ServerConfig {
            bind_address: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(Listener::bind(&config), Err(ListenerError::Bind(_))));
    }

    #[test]
    fn nothing_queued_is_not_an_error() {
        let listener = loopback(4);
        assert!(listener.try_accept().unwrap().is_none());
    }

    #[test]
    fn permits_bound_concurrent_connections() {
        let listener = loopback(1);
        let addr = listener.local_addr().unwrap();
        let _a = TcpStream::connect(addr).unwrap();
        let _b = TcpStream::connect(addr).unwrap();

        let mut first = None;
        for _ in 0..100 {
            if let Some(accepted) = listener.try_accept().unwrap() {
                first = Some(accepted);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let (_stream, _peer, permit) = first.expect("first connection accepted");
        assert!(!listener.has_capacity());
        assert!(listener.try_accept().unwrap().is_none());

        drop(permit);
        assert!(listener.has_capacity());
        assert_eq!(listener.available_permits(), 1);
    }
}
