//! Haven API Service - Main Entry Point
//!
//! Serves the house, resident and check-in API over a JetStream KV store.

use anyhow::Result;
use haven_api::{config::Config, create_app, AppState};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse_config();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,haven_api=debug,haven_core=debug"));
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Haven API Service");
    info!("Configuration:");
    info!("  Store: {:?}", config.store);
    info!("  NATS URL: {}", config.nats_url);
    info!("  KV bucket: {}", config.kv_bucket);
    info!("  Store timeout: {:?}", config.store_timeout);
    info!("  Report endpoint configured: {}", config.has_report_endpoint());
    info!("  CORS origin: {:?}", config.cors_origin);

    let state = match AppState::new(&config).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    // Repair anything a previous crash left half-written before serving
    match haven_core::reconcile(&state.repo).await {
        Ok(report) if !report.is_clean() => warn!(?report, "Startup reconciliation repaired occupancy"),
        Ok(_) => {}
        Err(e) => error!("Startup reconciliation failed: {}", e),
    }

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Haven API listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
