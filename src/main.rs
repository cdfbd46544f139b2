//! snapkv server entry point.
//!
//! Parses the command line, builds or reloads the store, starts the two
//! maintenance workers and the HTTP listener, and shuts everything down
//! in order on Ctrl+C.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use snapkv::storage::KVStore;
use snapkv::workers::{MaintenanceWorkers, WorkerConfig};
use snapkv::{server, DEFAULT_CLEANUP_INTERVAL_MS, DEFAULT_DIRECTORY, DEFAULT_FLUSH_INTERVAL_MS};
use snapkv::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SHARDS};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// How long to wait for open connections to drain after Ctrl+C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Directory the snapshot files are written to
    directory: String,
    /// Number of shards
    shards: usize,
    /// Reload the store from the snapshot directory on start
    load: bool,
    /// Flush interval in milliseconds
    flush_interval_ms: u64,
    /// Cleanup interval in milliseconds
    cleanup_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            directory: DEFAULT_DIRECTORY.to_string(),
            shards: DEFAULT_SHARDS,
            load: false,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--bind" | "-b" => {
                    config.host = take_value(&args, i, "--bind");
                    i += 2;
                }
                "--port" | "-p" => {
                    config.port = parse_value(&args, i, "--port");
                    i += 2;
                }
                "--directory" | "-d" => {
                    config.directory = take_value(&args, i, "--directory");
                    i += 2;
                }
                "--shards" | "-s" => {
                    config.shards = parse_value(&args, i, "--shards");
                    if config.shards == 0 {
                        eprintln!("Error: --shards must be at least 1");
                        std::process::exit(1);
                    }
                    i += 2;
                }
                "--load" | "-l" => {
                    config.load = true;
                    i += 1;
                }
                "--flush-interval" | "-f" => {
                    config.flush_interval_ms = parse_value(&args, i, "--flush-interval");
                    i += 2;
                }
                "--cleanup-interval" | "-c" => {
                    config.cleanup_interval_ms = parse_value(&args, i, "--cleanup-interval");
                    i += 2;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("snapkv version {}", snapkv::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn take_value(args: &[String], i: usize, flag: &str) -> String {
    match args.get(i + 1) {
        Some(value) => value.clone(),
        None => {
            eprintln!("Error: {flag} requires a value");
            std::process::exit(1);
        }
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    take_value(args, i, flag).parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value for {flag}");
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
snapkv - A Sharded In-Memory Key-Value Store with Snapshots

USAGE:
    snapkv [OPTIONS]

OPTIONS:
    -b, --bind <HOST>             Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>             Port to listen on (default: 8000)
    -d, --directory <DIR>         Snapshot directory (default: .snapkv)
    -s, --shards <N>              Number of shards (default: 5)
    -l, --load                    Reload the store from the snapshot
                                  directory on start (default: off)
    -f, --flush-interval <MS>     Snapshot flush interval in ms (default: 1000)
    -c, --cleanup-interval <MS>   Expiry cleanup interval in ms (default: 500)
    -v, --version                 Print version information
    -h, --help                    Print this help message

EXAMPLES:
    snapkv                          # Start on 0.0.0.0:8000
    snapkv --port 9000 --shards 16  # More shards, different port
    snapkv --load -d /var/snapkv    # Resume from existing snapshots

TALKING TO IT:
    $ curl -X POST localhost:8000/kv \
        -H 'Content-Type: application/json' \
        -d '{{"key": "name", "value": "snapkv", "ttl": 60}}'
    $ curl localhost:8000/kv/name
    {{"value":"snapkv"}}
    $ curl -X DELETE localhost:8000/kv/name
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
snapkv v{} - sharded in-memory key-value store with snapshots
-------------------------------------------------------------
Serving on         {}
Snapshot directory {} ({} shards)
Flush / cleanup    {} ms / {} ms

Use Ctrl+C to shutdown gracefully.
"#,
        snapkv::VERSION,
        config.bind_address(),
        config.directory,
        config.shards,
        config.flush_interval_ms,
        config.cleanup_interval_ms,
    );
}

/// Completes when SIGINT (Ctrl+C) is delivered.
async fn shutdown_signal() {
    signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    // The snapshot directory must exist before the store touches it.
    // When loading, a missing directory is an operator mistake, not
    // something to paper over with an empty store.
    let directory = Path::new(&config.directory);
    if !directory.exists() {
        if config.load {
            anyhow::bail!(
                "cannot load the store from {}: directory does not exist",
                config.directory
            );
        }
        std::fs::create_dir_all(directory)
            .with_context(|| format!("creating snapshot directory {}", config.directory))?;
    }

    let store = if config.load {
        info!("loading store from {}", config.directory);
        let store = KVStore::from_disk(config.shards, &config.directory)
            .context("loading store from disk")?;
        info!(entries = store.len(), "store loaded");
        store
    } else {
        KVStore::new(config.shards, &config.directory)
    };
    let store = Arc::new(store);

    print_banner(&config);

    // Both maintenance loops hang off one shutdown channel inside the
    // handle.
    let workers = MaintenanceWorkers::start(
        Arc::clone(&store),
        WorkerConfig {
            flush_interval: Duration::from_millis(config.flush_interval_ms),
            cleanup_interval: Duration::from_millis(config.cleanup_interval_ms),
        },
    );

    let app = server::router(Arc::clone(&store));
    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("binding {}", config.bind_address()))?;
    info!("listening on {}", config.bind_address());

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!(error = %e, "server error");
        }
    });

    shutdown_signal().await;
    info!("shutting down server and workers");

    // Give in-flight requests a bounded window to drain, then move on
    // so a stuck connection cannot wedge the shutdown.
    if tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
        warn!(
            "server did not drain within {}s, abandoning open connections",
            SHUTDOWN_GRACE.as_secs()
        );
    }

    workers.shutdown().await;
    info!("application stopped");
    Ok(())
}
