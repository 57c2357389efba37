//! emberd - Ember IRC Daemon
//!
//! A standalone RFC 1459 IRC server.

use emberd::config::Config;
use emberd::handlers::Registry;
use emberd::network::Gateway;
use emberd::state::Matrix;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Resolve the configuration path from CLI arguments.
/// Supports `-c <path>`, `--config <path>`, or a bare path.
/// Falls back to `emberd.toml` when no argument is provided.
fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);

    let raw_path = match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {}", flag);
            std::process::exit(1);
        }),
        Some(path) => path,
        None => "emberd.toml".to_string(),
    };

    match std::fs::canonicalize(Path::new(&raw_path)) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => raw_path,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let config_path = resolve_config_path();
    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("ERROR: Failed to load config from {}: {}", config_path, e);
        e
    })?;
    let m_line = config.m_line()?;

    info!(
        server = %m_line.host,
        info = %m_line.info,
        "Starting emberd"
    );

    let listen_addr = config.listen_addr(&m_line);
    let matrix = Arc::new(Matrix::new(&config, m_line));
    let registry = Arc::new(Registry::new());

    let gateway = Gateway::bind(listen_addr, matrix, registry).await?;
    gateway.run().await?;

    Ok(())
}
