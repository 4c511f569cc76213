use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use favicond::cache::{Group, Janitor, Manager};
use favicond::config::{self, ServiceConfig};
use favicond::fetch::Fetcher;
use favicond::http::{AppState, HttpServer};
use favicond::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "favicond")]
#[command(about = "Favicon fetching and rasterization service", long_about = None)]
struct Cli {
    /// Path to a TOML config file; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the cache root directory.
    #[arg(long)]
    cache_dir: Option<String>,

    /// Override the cache TTL in seconds.
    #[arg(long)]
    cache_ttl_secs: Option<u64>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ServiceConfig::default(),
    };
    apply_overrides(&mut config, &cli);

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        bind_address = %config.listener.bind_address,
        cache_root = %config.cache.root,
        cache_ttl_secs = config.cache.ttl_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Cache layout + janitor
    let cache = Manager::new(&config.cache.root, Duration::from_secs(config.cache.ttl_secs));
    cache.ensure_dirs().await?;

    let janitor = (config.cache.janitor_interval_secs > 0).then(|| {
        Janitor::new(
            cache.clone(),
            Duration::from_secs(config.cache.janitor_interval_secs),
            config.cache.max_bytes,
        )
        .spawn()
    });

    let state = AppState {
        fetcher: Fetcher::new()?,
        cache,
        fetch_group: Arc::new(Group::new()),
        response: config.response.clone(),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(&config, state);
    server.run(listener).await?;

    if let Some(janitor) = janitor {
        janitor.shutdown().await;
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn apply_overrides(config: &mut ServiceConfig, cli: &Cli) {
    if let Some(port) = cli.port {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(h, _)| h.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache.root = dir.clone();
    }
    if let Some(ttl) = cli.cache_ttl_secs {
        config.cache.ttl_secs = ttl;
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
}
