//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustls::RootCertStore;
use tlsmux::engine::RustlsSession;
use tlsmux::mux::{dispatch_ready, populate_wait_set, PollWaiter, ReadinessWait, RetryMask};
use tlsmux::net::{Connection, TlsContext};

pub type TlsConn = Connection<TcpStream, RustlsSession>;

/// Self-signed identity for `localhost`.
pub struct Identity {
    pub cert_pem: String,
    pub key_pem: String,
    pub server: TlsContext,
    pub client: TlsContext,
}

pub fn identity() -> Identity {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = certified.cert.der().clone();
    let key_der = rustls::pki_types::PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());

    let server = TlsContext::server(vec![cert_der.clone()], key_der.into()).unwrap();
    let mut roots = RootCertStore::empty();
    roots.add(cert_der).unwrap();
    let client = TlsContext::client(roots).unwrap();

    Identity {
        cert_pem: certified.cert.pem(),
        key_pem: certified.key_pair.serialize_pem(),
        server,
        client,
    }
}

/// Write the identity's PEM files into `dir`; returns (cert, key) paths.
pub fn write_pem(identity: &Identity, dir: &Path) -> (PathBuf, PathBuf) {
    let cert = dir.join("cert.pem");
    let key = dir.join("key.pem");
    std::fs::write(&cert, &identity.cert_pem).unwrap();
    std::fs::write(&key, &identity.key_pem).unwrap();
    (cert, key)
}

/// Connected loopback TCP pair: (accepted, dialed).
pub fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let dialed = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (accepted, _) = listener.accept().unwrap();
    (accepted, dialed)
}

/// Server and client TLS connections over a loopback pair, no handshake yet.
pub fn tls_pair(identity: &Identity) -> (TlsConn, TlsConn) {
    let (accepted, dialed) = tcp_pair();
    let server = identity.server.accept(accepted).unwrap();
    let client = identity.client.connect(dialed, "localhost").unwrap();
    (server, client)
}

/// Wait once on every connection's pending operations and return their
/// retry masks, in order.
pub fn wait_round(waiter: &mut PollWaiter, conns: &[&TlsConn], timeout: Duration) -> Vec<RetryMask> {
    let set = populate_wait_set(conns.iter().copied());
    let result = waiter.wait(&set, Some(timeout)).unwrap();
    dispatch_ready(conns.iter().copied(), &result)
}

/// Drive both handshakes to completion using only the aggregator.
pub fn handshake_pair(server: &mut TlsConn, client: &mut TlsConn) {
    let mut waiter = PollWaiter::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut masks = vec![RetryMask::empty(), RetryMask::empty()];
    let mut first = true;

    while !(server.is_established() && client.is_established()) {
        assert!(Instant::now() < deadline, "handshake did not finish");
        if first || !masks[0].is_empty() {
            server.accept_step().unwrap();
        }
        if first || !masks[1].is_empty() {
            client.connect_step().unwrap();
        }
        first = false;
        masks = wait_round(&mut waiter, &[&*server, &*client], Duration::from_millis(200));
    }
}
