//! rustls-backed session.
//!
//! rustls is sans-IO: records move between the session and the socket only
//! through `read_tls`/`write_tls`. Each attempt below pumps those two calls
//! until either the requested operation completes or the socket reports
//! `WouldBlock`, which becomes `WantRead`/`WantWrite`.

use std::io::{self, Read, Write};
use std::sync::Arc;

use ::rustls::pki_types::ServerName;
use ::rustls::{ClientConfig, ClientConnection, ServerConfig, ServerConnection};

use super::{fatal_from_io, EngineStatus, TlsSession};
use crate::error::FatalKind;

enum TlsConnection {
    Server(ServerConnection),
    Client(ClientConnection),
}

impl TlsConnection {
    fn read_tls(&mut self, rd: &mut dyn Read) -> io::Result<usize> {
        match self {
            TlsConnection::Server(conn) => conn.read_tls(rd),
            TlsConnection::Client(conn) => conn.read_tls(rd),
        }
    }

    fn write_tls(&mut self, wr: &mut dyn Write) -> io::Result<usize> {
        match self {
            TlsConnection::Server(conn) => conn.write_tls(wr),
            TlsConnection::Client(conn) => conn.write_tls(wr),
        }
    }

    fn process_new_packets(&mut self) -> Result<::rustls::IoState, ::rustls::Error> {
        match self {
            TlsConnection::Server(conn) => conn.process_new_packets(),
            TlsConnection::Client(conn) => conn.process_new_packets(),
        }
    }

    fn wants_write(&self) -> bool {
        match self {
            TlsConnection::Server(conn) => conn.wants_write(),
            TlsConnection::Client(conn) => conn.wants_write(),
        }
    }

    fn is_handshaking(&self) -> bool {
        match self {
            TlsConnection::Server(conn) => conn.is_handshaking(),
            TlsConnection::Client(conn) => conn.is_handshaking(),
        }
    }

    fn writer(&mut self) -> ::rustls::Writer<'_> {
        match self {
            TlsConnection::Server(conn) => conn.writer(),
            TlsConnection::Client(conn) => conn.writer(),
        }
    }

    fn reader(&mut self) -> ::rustls::Reader<'_> {
        match self {
            TlsConnection::Server(conn) => conn.reader(),
            TlsConnection::Client(conn) => conn.reader(),
        }
    }

    fn send_close_notify(&mut self) {
        match self {
            TlsConnection::Server(conn) => conn.send_close_notify(),
            TlsConnection::Client(conn) => conn.send_close_notify(),
        }
    }
}

/// Outcome of pushing queued ciphertext to the socket.
enum Flush {
    Done,
    Blocked,
    Failed(io::Error),
}

/// A rustls client or server session.
pub struct RustlsSession {
    conn: TlsConnection,
    /// Plaintext bytes accepted by the last `write_attempt` whose ciphertext
    /// has not fully reached the socket yet.
    staged: usize,
}

impl RustlsSession {
    pub fn server(config: Arc<ServerConfig>) -> Result<Self, ::rustls::Error> {
        Ok(Self {
            conn: TlsConnection::Server(ServerConnection::new(config)?),
            staged: 0,
        })
    }

    pub fn client(config: Arc<ClientConfig>, name: ServerName<'static>) -> Result<Self, ::rustls::Error> {
        Ok(Self {
            conn: TlsConnection::Client(ClientConnection::new(config, name)?),
            staged: 0,
        })
    }

    /// SNI received from the client (server sessions only).
    pub fn server_name(&self) -> Option<&str> {
        match &self.conn {
            TlsConnection::Server(conn) => conn.server_name(),
            TlsConnection::Client(_) => None,
        }
    }

    /// Negotiated ALPN protocol, if any.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        match &self.conn {
            TlsConnection::Server(conn) => conn.alpn_protocol(),
            TlsConnection::Client(conn) => conn.alpn_protocol(),
        }
    }

    fn flush<T: Write>(&mut self, io: &mut T) -> Flush {
        while self.conn.wants_write() {
            match self.conn.write_tls(io) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Flush::Blocked,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Flush::Failed(e),
            }
        }
        Flush::Done
    }
}

impl TlsSession for RustlsSession {
    fn handshake_attempt<T: Read + Write>(&mut self, io: &mut T) -> EngineStatus<()> {
        loop {
            match self.flush(io) {
                Flush::Done => {}
                Flush::Blocked => return EngineStatus::WantWrite,
                Flush::Failed(e) => return fatal_from_io(&e),
            }

            if !self.conn.is_handshaking() {
                return EngineStatus::Progress(());
            }

            match self.conn.read_tls(io) {
                Ok(0) => {
                    return EngineStatus::Fatal(
                        FatalKind::PeerReset,
                        "connection closed during handshake".to_string(),
                    );
                }
                Ok(_) => {
                    if let Err(e) = self.conn.process_new_packets() {
                        // Let the peer see the alert if the socket takes it.
                        let _ = self.flush(io);
                        return EngineStatus::Fatal(FatalKind::HandshakeFailed, e.to_string());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return EngineStatus::WantRead,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return fatal_from_io(&e),
            }
        }
    }

    fn write_attempt<T: Read + Write>(&mut self, io: &mut T, buf: &[u8]) -> EngineStatus<usize> {
        match self.flush(io) {
            Flush::Done => {}
            Flush::Blocked => return EngineStatus::WantWrite,
            Flush::Failed(e) => return fatal_from_io(&e),
        }

        if self.staged > 0 {
            return EngineStatus::Progress(std::mem::take(&mut self.staged));
        }

        let accepted = match self.conn.writer().write(buf) {
            Ok(n) => n,
            Err(e) => return fatal_from_io(&e),
        };
        self.staged = accepted;

        match self.flush(io) {
            Flush::Done => EngineStatus::Progress(std::mem::take(&mut self.staged)),
            Flush::Blocked => EngineStatus::WantWrite,
            Flush::Failed(e) => fatal_from_io(&e),
        }
    }

    fn read_attempt<T: Read + Write>(&mut self, io: &mut T, buf: &mut [u8]) -> EngineStatus<usize> {
        loop {
            match self.conn.reader().read(buf) {
                Ok(0) => {
                    return EngineStatus::Fatal(
                        FatalKind::PeerReset,
                        "peer sent close_notify".to_string(),
                    );
                }
                Ok(n) => return EngineStatus::Progress(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return EngineStatus::Fatal(
                        FatalKind::PeerReset,
                        "peer closed without close_notify".to_string(),
                    );
                }
                Err(e) => return fatal_from_io(&e),
            }

            // Key updates and alerts queue output that must leave before more input.
            match self.flush(io) {
                Flush::Done => {}
                Flush::Blocked => return EngineStatus::WantWrite,
                Flush::Failed(e) => return fatal_from_io(&e),
            }

            match self.conn.read_tls(io) {
                Ok(_) => {
                    if let Err(e) = self.conn.process_new_packets() {
                        let _ = self.flush(io);
                        return EngineStatus::Fatal(FatalKind::ProtocolError, e.to_string());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return EngineStatus::WantRead,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return fatal_from_io(&e),
            }
        }
    }

    fn shutdown<T: Read + Write>(&mut self, io: &mut T) {
        self.conn.send_close_notify();
        if let Err(e) = self.conn.write_tls(io) {
            tracing::trace!(error = %e, "close_notify not delivered");
        }
    }

    fn is_handshaking(&self) -> bool {
        self.conn.is_handshaking()
    }
}

impl std::fmt::Debug for RustlsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self.conn {
            TlsConnection::Server(_) => "server",
            TlsConnection::Client(_) => "client",
        };
        f.debug_struct("RustlsSession")
            .field("role", &role)
            .field("handshaking", &self.conn.is_handshaking())
            .field("staged", &self.staged)
            .finish()
    }
}
