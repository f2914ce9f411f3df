//! Blocking-style HTTPS fetch over the bounded-wait wrappers.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use thiserror::Error;

use crate::config::TimeoutConfig;
use crate::error::{FatalKind, MuxError};
use crate::mux::wait::PollWaiter;
use crate::net::tls::{TlsContext, TlsSetupError};
use crate::resilience::timeouts::{deadline_after, handshake_with_timeout, recv_with_timeout, send_all_with_timeout};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Setup(#[from] TlsSetupError),

    #[error(transparent)]
    Transfer(#[from] MuxError),
}

/// What came back from one fetch.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub bytes_received: usize,
    pub body: Vec<u8>,
    /// ALPN protocol the server picked, if any.
    pub alpn: Option<Vec<u8>>,
}

impl FetchReport {
    /// Status line of the response, if it is valid UTF-8.
    pub fn status_line(&self) -> Option<&str> {
        let end = self.body.windows(2).position(|w| w == b"\r\n")?;
        std::str::from_utf8(&self.body[..end]).ok()
    }
}

/// Send `GET path HTTP/1.0` and read until the server closes.
///
/// The server closing, cleanly or not, ends the response; any bytes read
/// before that are returned.
pub fn fetch(
    tls: &TlsContext,
    addr: SocketAddr,
    server_name: &str,
    path: &str,
    timeouts: &TimeoutConfig,
) -> Result<FetchReport, FetchError> {
    let stream = TcpStream::connect_timeout(&addr, timeouts.handshake())
        .map_err(|source| FetchError::Connect { addr, source })?;
    let mut conn = tls.connect(stream, server_name)?;
    let mut waiter = PollWaiter::new();

    handshake_with_timeout(&mut conn, &mut waiter, deadline_after(timeouts.handshake()))?;
    tracing::debug!(connection_id = %conn.id(), %addr, "Connected");

    let request = format!("GET {path} HTTP/1.0\r\n\r\n");
    send_all_with_timeout(&mut conn, &mut waiter, request.as_bytes(), deadline_after(timeouts.send()))?;

    let mut body = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match recv_with_timeout(&mut conn, &mut waiter, &mut buf, deadline_after(timeouts.recv())) {
            Ok(n) => body.extend_from_slice(&buf[..n]),
            Err(e) if e.fatal_kind() == Some(FatalKind::PeerReset) => break,
            Err(e) => return Err(e.into()),
        }
    }

    let alpn = conn.session().alpn_protocol().map(<[u8]>::to_vec);
    tracing::info!(connection_id = %conn.id(), bytes = body.len(), "Response received");
    conn.close();

    Ok(FetchReport {
        bytes_received: body.len(),
        body,
        alpn,
    })
}

/// Default timeouts with every bound set to `timeout`.
pub fn uniform_timeouts(timeout: Duration) -> TimeoutConfig {
    let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    TimeoutConfig {
        handshake_ms: ms,
        recv_ms: ms,
        send_ms: ms,
        idle_ms: ms,
    }
}
