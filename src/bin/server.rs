//! FineDB Server Binary
//!
//! Starts the TCP server for FineDB.

use std::path::PathBuf;

use clap::Parser;
use finedb::config::DEFAULT_PORT;
use finedb::{Config, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// FineDB Server
#[derive(Parser, Debug)]
#[command(name = "finedb-server")]
#[command(about = "Networked key-value store over LMDB")]
#[command(version)]
struct Args {
    /// Number of connection worker threads
    #[arg(short = 't', long, default_value = "15")]
    threads: usize,

    /// Maximum number of named sub-databases
    #[arg(short = 'n', long, default_value = "16")]
    max_dbs: u32,

    /// Database map size in bytes
    #[arg(short = 's', long, default_value = "10485760")]
    map_size: usize,

    /// Listening port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Listening address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Database directory
    #[arg(short = 'f', long, default_value = "./finedb_data")]
    path: PathBuf,

    /// Connection idle timeout in seconds
    #[arg(short = 'i', long, default_value = "30")]
    timeout: u64,

    /// Log every request
    #[arg(short = 'd', long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize tracing/logging
    let default_filter = if args.debug { "info,finedb=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .init();

    tracing::info!("FineDB Server v{}", finedb::VERSION);
    tracing::info!("Database directory: {}", args.path.display());

    let timeout_ms = args.timeout.saturating_mul(1000);
    let config = Config::builder()
        .data_dir(&args.path)
        .listen_addr(format!("{}:{}", args.host, args.port))
        .workers(args.threads)
        .map_size(args.map_size)
        .max_dbs(args.max_dbs)
        .read_timeout_ms(timeout_ms)
        .write_timeout_ms(timeout_ms)
        .build();

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    match server.run() {
        Ok(stats) => tracing::info!(
            "Server stopped ({} asynchronous writes applied, {} failed)",
            stats.applied,
            stats.failed
        ),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            std::process::exit(1);
        }
    }
}
