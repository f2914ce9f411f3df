//! tlsmux: non-blocking TLS multiplexer demo binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     TCP socket ──▶ net::tls (TlsContext) ──▶ net::connection (socket + session + pending)
//!                                                     │
//!                                                     ▼
//!                                net::driver (one engine attempt: progress / retry / fatal)
//!                                                     │ would-block marks pending[op]
//!                                                     ▼
//!            mux::aggregator (populate_wait_set) ──▶ mux::wait (poll) ──▶ dispatch_ready
//!                                                     │
//!                      ┌──────────────────────────────┴──────────────────────┐
//!                      ▼                                                     ▼
//!          http::server (many connections,                resilience::timeouts (one connection,
//!          one loop)                                       deadline-bounded) ◀── http::client
//! ```
//!
//! Cross-cutting: config (TOML), observability (tracing), lifecycle (shutdown flag).

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tlsmux::config::{load_config, MuxConfig};
use tlsmux::http::{fetch, HttpServer};
use tlsmux::lifecycle::{install_signal_handlers, Shutdown};
use tlsmux::net::TlsContext;
use tlsmux::observability::init_logging;

#[derive(Parser)]
#[command(name = "tlsmux")]
#[command(about = "Non-blocking TLS multiplexer: demo responder and fetch client", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a fixed page over HTTPS
    Serve {
        /// Overrides server.bind_address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Fetch a path from an HTTPS server
    Fetch {
        addr: SocketAddr,

        /// Overrides tls.server_name
        #[arg(long)]
        server_name: Option<String>,

        #[arg(long, default_value = "/")]
        path: String,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => MuxConfig::default(),
    };

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            init_logging(&config.observability)?;
            tracing::info!(
                bind_address = %config.server.bind_address,
                max_connections = config.server.max_connections,
                idle_ms = config.timeouts.idle_ms,
                "Configuration loaded"
            );

            let tls = TlsContext::server_from_config(&config.tls)?;
            let shutdown = Shutdown::new();
            install_signal_handlers(&shutdown)?;
            let server = HttpServer::bind(config, tls, shutdown)?;
            server.run();
            tracing::info!("Shutdown complete");
        }
        Commands::Fetch {
            addr,
            server_name,
            path,
        } => {
            init_logging(&config.observability)?;
            let tls = TlsContext::client_from_config(&config.tls)?;
            let server_name = server_name.unwrap_or_else(|| config.tls.server_name.clone());

            let report = fetch(&tls, addr, &server_name, &path, &config.timeouts)?;
            if let Some(status) = report.status_line() {
                println!("{status}");
            }
            println!("{} bytes received", report.bytes_received);
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
