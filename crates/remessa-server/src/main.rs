mod error;
mod provider_http;
mod routes;
mod signature;
mod webhook;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use remessa_core::pipeline::{Metrics, Pipeline, RemessaConfig};
use remessa_core::{RocksDbStorage, Storage};
use tracing::{error, info};

use provider_http::HttpProvider;
use signature::WebhookVerifier;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub metrics: Metrics,
    pub verifier: Arc<WebhookVerifier>,
}

fn load_config() -> RemessaConfig {
    let paths = ["remessa.toml", "/etc/remessa/remessa.toml"];

    for path in &paths {
        if Path::new(path).exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => {
                        info!(path, "loaded configuration");
                        return config;
                    }
                    Err(e) => {
                        eprintln!("error parsing {path}: {e}");
                        std::process::exit(1);
                    }
                },
                Err(e) => {
                    eprintln!("error reading {path}: {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    info!("no config file found, using defaults");
    RemessaConfig::default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    remessa_core::telemetry::init_tracing();

    let config = load_config();
    let listen_addr = config.server.listen_addr.clone();
    let interval_secs = config.cycle.interval_secs;

    let data_dir = std::env::var("REMESSA_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let storage = Arc::new(RocksDbStorage::open(&data_dir)?);

    let api_key = std::env::var("REMESSA_PROVIDER_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        error!("REMESSA_PROVIDER_API_KEY is not set, provider calls will be rejected");
    }
    let provider = Arc::new(HttpProvider::new(&config.provider, api_key)?);

    let webhook_secret = std::env::var("REMESSA_WEBHOOK_SECRET").ok();

    let mut pipeline = Pipeline::new(storage.clone(), provider, config);
    let state = AppState {
        storage: storage.clone(),
        metrics: pipeline.metrics().clone(),
        verifier: Arc::new(WebhookVerifier::new(webhook_secret)),
    };

    // The pipeline lives on its own task; cycles never overlap because the
    // loop awaits each one before ticking again.
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = pipeline.run_cycle().await {
                error!(error = %e, "send cycle failed");
            }
        }
    });

    let app = Router::new()
        .route("/jobs", post(routes::enqueue_job))
        .route("/queue/stats", get(routes::queue_stats))
        .route(
            "/webhooks/email",
            post(webhook::receive_event).get(webhook::describe_endpoint),
        )
        .with_state(state);

    info!(%listen_addr, "starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, flushing storage");
    storage.flush()?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to install CTRL+C handler");
    }

    info!("received shutdown signal");
}
