//! rememberlist-server: a small query server for shared lists.
//!
//! Clients connect over TCP and send one of two text commands:
//! - `lists\n` returns the lists file
//! - `values<d>\n` returns segment `d` of the `#`-separated values file
//!
//! Every connection is served by its own task; a failing or idle client
//! only ever loses its own connection.
//!
//! Configuration via CLI arguments or TOML file.

mod config;
mod handler;
mod protocol;
mod server;
mod source;

use config::Config;
use server::Listener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        backlog = config.backlog,
        read_timeout_secs = config.read_timeout.as_secs(),
        buffer_size = config.buffer_size,
        framing = ?config.framing,
        lists = %config.lists_path.display(),
        values = %config.values_path.display(),
        "Starting rememberlist server"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers.max(1));
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(async {
        let listener = Listener::bind(&config)?;
        listener.run().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
