//! TLS configuration and certificate loading.
//!
//! A [`TlsContext`] is built once and shared by every connection of that
//! role. It is immutable after construction, so clones can be handed to any
//! thread.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use thiserror::Error;

use crate::config::schema::TlsConfig;
use crate::engine::RustlsSession;
use crate::net::connection::{Connection, Role, Socket};

/// Errors building a TLS context or session.
#[derive(Debug, Error)]
pub enum TlsSetupError {
    /// Certificate, key or CA file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(String),

    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    /// Context role does not match the requested operation.
    #[error("context has no {0} configuration")]
    WrongRole(&'static str),

    #[error("socket setup failed: {0}")]
    Socket(#[source] io::Error),
}

/// Shared, read-only TLS configuration for one role.
#[derive(Debug, Clone)]
pub enum TlsContext {
    Server(Arc<ServerConfig>),
    Client(Arc<ClientConfig>),
}

impl TlsContext {
    /// Server context from an in-memory certificate chain and key.
    pub fn server(
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, TlsSetupError> {
        let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        Ok(TlsContext::Server(Arc::new(config)))
    }

    /// Client context trusting exactly `roots`.
    pub fn client(roots: RootCertStore) -> Result<Self, TlsSetupError> {
        let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(TlsContext::Client(Arc::new(config)))
    }

    /// Server context from PEM files.
    pub fn server_from_pem(cert_path: &Path, key_path: &Path) -> Result<Self, TlsSetupError> {
        let certs = load_certs(cert_path)?;
        let key = load_private_key(key_path)?;
        Self::server(certs, key)
    }

    /// Client context trusting the CA certificates in a PEM file.
    pub fn client_from_pem(ca_path: &Path) -> Result<Self, TlsSetupError> {
        let mut roots = RootCertStore::empty();
        for cert in load_certs(ca_path)? {
            roots.add(cert)?;
        }
        Self::client(roots)
    }

    /// Server context from the `[tls]` config section.
    pub fn server_from_config(config: &TlsConfig) -> Result<Self, TlsSetupError> {
        match (&config.cert_path, &config.key_path) {
            (Some(cert), Some(key)) => Self::server_from_pem(Path::new(cert), Path::new(key)),
            _ => Err(TlsSetupError::WrongRole("server certificate")),
        }
    }

    /// Client context from the `[tls]` config section.
    pub fn client_from_config(config: &TlsConfig) -> Result<Self, TlsSetupError> {
        match &config.ca_path {
            Some(ca) => Self::client_from_pem(Path::new(ca)),
            None => Err(TlsSetupError::WrongRole("trust root")),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            TlsContext::Server(_) => Role::Server,
            TlsContext::Client(_) => Role::Client,
        }
    }

    /// Fresh per-connection session. `server_name` is required for clients.
    pub fn new_session(&self, server_name: Option<&str>) -> Result<RustlsSession, TlsSetupError> {
        match self {
            TlsContext::Server(config) => Ok(RustlsSession::server(Arc::clone(config))?),
            TlsContext::Client(config) => {
                let name = server_name.ok_or(TlsSetupError::InvalidServerName(String::new()))?;
                let name = ServerName::try_from(name.to_string())
                    .map_err(|_| TlsSetupError::InvalidServerName(name.to_string()))?;
                Ok(RustlsSession::client(Arc::clone(config), name)?)
            }
        }
    }

    /// Bind an accepted socket to a server session. No handshake bytes move yet.
    pub fn accept<S: Socket>(&self, socket: S) -> Result<Connection<S, RustlsSession>, TlsSetupError> {
        if self.role() != Role::Server {
            return Err(TlsSetupError::WrongRole("server"));
        }
        let session = self.new_session(None)?;
        Connection::new(socket, session, Role::Server).map_err(TlsSetupError::Socket)
    }

    /// Bind a dialed socket to a client session for `server_name`.
    pub fn connect<S: Socket>(
        &self,
        socket: S,
        server_name: &str,
    ) -> Result<Connection<S, RustlsSession>, TlsSetupError> {
        if self.role() != Role::Client {
            return Err(TlsSetupError::WrongRole("client"));
        }
        let session = self.new_session(Some(server_name))?;
        Connection::new(socket, session, Role::Client).map_err(TlsSetupError::Socket)
    }
}

fn open(path: &Path) -> Result<BufReader<File>, TlsSetupError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsSetupError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Load every certificate from a PEM file.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsSetupError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsSetupError::Io {
            path: path.display().to_string(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsSetupError::NoCertificates(path.display().to_string()));
    }
    Ok(certs)
}

/// Load the first private key (PKCS#1, PKCS#8 or SEC1) from a PEM file.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsSetupError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsSetupError::Io {
            path: path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsSetupError::NoPrivateKey(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn self_signed() -> (String, String, CertificateDer<'static>) {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (
            certified.cert.pem(),
            certified.key_pair.serialize_pem(),
            certified.cert.der().clone(),
        )
    }

    #[test]
    fn missing_certificate_file() {
        let err = load_certs(Path::new("/nonexistent/cert.pem")).unwrap_err();
        assert!(matches!(err, TlsSetupError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/cert.pem"));
    }

    #[test]
    fn pem_without_key_is_rejected() {
        let (cert_pem, _, _) = self_signed();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(cert_pem.as_bytes()).unwrap();

        let err = load_private_key(file.path()).unwrap_err();
        assert!(matches!(err, TlsSetupError::NoPrivateKey(_)));
    }

    #[test]
    fn builds_server_and_client_contexts_from_pem() {
        let (cert_pem, key_pem, _) = self_signed();
        let mut cert = tempfile::NamedTempFile::new().unwrap();
        cert.write_all(cert_pem.as_bytes()).unwrap();
        let mut key = tempfile::NamedTempFile::new().unwrap();
        key.write_all(key_pem.as_bytes()).unwrap();

        let server = TlsContext::server_from_pem(cert.path(), key.path()).unwrap();
        assert_eq!(server.role(), Role::Server);
        assert!(server.new_session(None).is_ok());

        let client = TlsContext::client_from_pem(cert.path()).unwrap();
        assert_eq!(client.role(), Role::Client);
        assert!(client.new_session(Some("localhost")).is_ok());
        assert!(matches!(
            client.new_session(Some("not a hostname!")),
            Err(TlsSetupError::InvalidServerName(_))
        ));
    }

    #[test]
    fn role_mismatch_is_rejected() {
        let (_, _, der) = self_signed();
        let mut roots = RootCertStore::empty();
        roots.add(der).unwrap();
        let client = TlsContext::client(roots).unwrap();

        let (socket, _peer) = std::os::unix::net::UnixStream::pair().unwrap();
        assert!(matches!(client.accept(socket), Err(TlsSetupError::WrongRole(_))));
    }
}
