use anyhow::Result;
use clap::Parser;
use log::info;
use meili_gateway::backend::SearchBackend;
use meili_gateway::config::ConfigCache;
use meili_gateway::search_clients::meilisearch::MeilisearchClient;
use meili_gateway::web_server;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(version, about = "HTTP gateway for a Meilisearch server")]
struct Cli {
    /// Directory holding default/<RUN_MODE>/local configuration files.
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Overrides the configured listening port.
    #[arg(long)]
    port: Option<u16>,
}

/// Drops the cached configuration on SIGHUP so the next request reloads it.
#[cfg(unix)]
fn spawn_reload_listener(cache: ConfigCache) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            info!("SIGHUP received, reloading configuration on next request.");
            cache.invalidate();
            if let Err(e) = cache.get() {
                log::error!("Reloaded configuration is invalid: {}", e);
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_reload_listener(_cache: ConfigCache) -> std::io::Result<()> {
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cache = ConfigCache::from_dir(cli.config_dir.clone());
    let mut config = (*cache.get()?).clone();
    if let Some(port) = cli.port {
        config.web_port = port;
    }

    // Initialize env_logger based on config.log_level
    env_logger::Builder::new()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    info!("Starting meili-gateway in front of {}", config.http_addr);

    let backend: Arc<dyn SearchBackend> = Arc::new(MeilisearchClient::new(cache.clone())?);
    spawn_reload_listener(cache.clone())?;

    if let Err(e) = web_server::start_web_server(Arc::new(config), backend, cache).await {
        log::error!("Web server error: {}", e);
    }

    info!("meili-gateway finished");

    Ok(())
}
