//! CR AudioViz AI back-office service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crav_service::{create_router, AppState, ServiceConfig};
use crav_store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crav=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CR AudioViz AI service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        app_env = %config.app_env,
        database_configured = %config.database_url.is_some(),
        stripe_configured = %config.stripe_secret_key.is_some(),
        paypal_configured = %config.paypal_client_id.is_some(),
        paypal_mode = config.paypal_mode.as_str(),
        "Service configuration loaded"
    );

    let store: Arc<dyn Store> = if let Some(url) = &config.database_url {
        tracing::info!("Connecting to PostgreSQL");
        let store = PgStore::connect(url, config.database_max_connections).await?;
        store.migrate().await?;
        tracing::info!("Database migrations applied");
        Arc::new(store)
    } else {
        tracing::warn!("DATABASE_URL not set - using in-memory store, data is lost on restart");
        Arc::new(MemoryStore::new())
    };

    let state = AppState::new(store, config.clone());

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
