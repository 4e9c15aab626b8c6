use anyhow::{Context, Result};
use hubspot_link::api::{create_app, AppState};
use hubspot_link::config::LinkConfig;
use hubspot_link::store::{open_store, run_store_cleanup};
use std::time::Duration;
use tracing::info;

const CONFIG_PATH_ENV: &str = "HUBSPOT_LINK_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "hubspot-link.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hubspot_link=info".into()),
        )
        .init();

    info!("HubSpot link service starting...");

    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = LinkConfig::load(&config_path)?;
    config.apply_env();
    config.validate()?;

    info!(
        config_path = %config_path,
        bind_addr = %config.server.bind_addr,
        backend = ?config.store.backend,
        policy = ?config.flow.credential_policy,
        "Configuration loaded"
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fetch.request_timeout_seconds))
        .build()
        .context("Failed to build HTTP client")?;

    let store = open_store(&config.store)?;
    tokio::spawn(run_store_cleanup(
        store.clone(),
        config.store.cleanup_interval_seconds,
    ));

    let app = create_app(AppState::from_config(&config, http, store), &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HubSpot link service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
