//! End-to-end: multiplexed responder and fetch client over loopback.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tlsmux::config::{MuxConfig, TlsConfig};
use tlsmux::http::{client::uniform_timeouts, fetch, HttpServer, RESPONSE};
use tlsmux::lifecycle::Shutdown;
use tlsmux::net::TlsContext;

mod common;

use common::{identity, write_pem};

struct Running {
    addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl Running {
    fn stop(self) {
        self.shutdown.trigger();
        self.handle.join().unwrap();
    }
}

fn start(tls: TlsContext, tweak: impl FnOnce(&mut MuxConfig)) -> Running {
    let mut config = MuxConfig::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config.server.poll_interval_ms = 20;
    tweak(&mut config);

    let shutdown = Shutdown::new();
    let server = HttpServer::bind(config, tls, shutdown.clone()).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = thread::spawn(move || server.run());
    Running { addr, shutdown, handle }
}

#[test]
fn serves_fixed_page_to_concurrent_clients() {
    let id = identity();
    let running = start(id.server.clone(), |_| {});

    let clients: Vec<_> = (0..8)
        .map(|i| {
            let tls = id.client.clone();
            let addr = running.addr;
            thread::spawn(move || fetch(&tls, addr, "localhost", &format!("/page/{i}"), &uniform_timeouts(Duration::from_secs(5))))
        })
        .collect();

    for client in clients {
        let report = client.join().unwrap().unwrap();
        assert_eq!(report.body, RESPONSE);
        assert_eq!(report.status_line(), Some("HTTP/1.0 200 OK"));
    }

    running.stop();
}

#[test]
fn connection_cap_queues_extra_clients() {
    let id = identity();
    let running = start(id.server.clone(), |config| config.server.max_connections = 1);

    let clients: Vec<_> = (0..3)
        .map(|_| {
            let tls = id.client.clone();
            let addr = running.addr;
            thread::spawn(move || fetch(&tls, addr, "localhost", "/", &uniform_timeouts(Duration::from_secs(5))))
        })
        .collect();

    for client in clients {
        assert_eq!(client.join().unwrap().unwrap().bytes_received, RESPONSE.len());
    }

    running.stop();
}

#[test]
fn idle_connection_is_dropped() {
    let id = identity();
    let running = start(id.server.clone(), |config| config.timeouts.idle_ms = 100);

    // Plain TCP, never starts a handshake.
    let mut raw = TcpStream::connect(running.addr).unwrap();
    raw.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    // The server may say goodbye with a close_notify alert before EOF.
    let mut tail = Vec::new();
    raw.read_to_end(&mut tail).unwrap();
    assert!(tail.is_empty() || tail[0] == 0x15, "unexpected bytes before EOF: {tail:?}");

    running.stop();
}

#[test]
fn garbage_handshake_does_not_stop_the_server() {
    let id = identity();
    let running = start(id.server.clone(), |_| {});

    let mut raw = TcpStream::connect(running.addr).unwrap();
    raw.write_all(b"definitely not a ClientHello\r\n\r\n").unwrap();
    raw.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut sink = Vec::new();
    let _ = raw.read_to_end(&mut sink);

    let report = fetch(&id.client, running.addr, "localhost", "/", &uniform_timeouts(Duration::from_secs(5))).unwrap();
    assert_eq!(report.body, RESPONSE);

    running.stop();
}

#[test]
fn contexts_load_from_pem_config() {
    let id = identity();
    let dir = tempfile::tempdir().unwrap();
    let (cert, key) = write_pem(&id, dir.path());

    let tls_config = TlsConfig {
        cert_path: Some(cert.display().to_string()),
        key_path: Some(key.display().to_string()),
        ca_path: Some(cert.display().to_string()),
        ..TlsConfig::default()
    };
    let server_tls = TlsContext::server_from_config(&tls_config).unwrap();
    let client_tls = TlsContext::client_from_config(&tls_config).unwrap();

    let running = start(server_tls, |_| {});
    let report = fetch(
        &client_tls,
        running.addr,
        &tls_config.server_name,
        "/",
        &uniform_timeouts(Duration::from_secs(5)),
    )
    .unwrap();
    assert_eq!(report.bytes_received, RESPONSE.len());

    running.stop();
}

#[test]
fn shutdown_with_open_connections() {
    let id = identity();
    let running = start(id.server.clone(), |_| {});

    let _lingering = TcpStream::connect(running.addr).unwrap();
    thread::sleep(Duration::from_millis(50));

    running.stop();
}
