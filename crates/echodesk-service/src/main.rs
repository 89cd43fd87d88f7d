//! EchoDesk Service - HTTP API for AI receptionists
//!
//! This is the main entry point for the echodesk service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use echodesk_service::{create_router, AppState, ServiceConfig};
use echodesk_store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,echodesk=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EchoDesk Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        database_configured = %config.database_url.is_some(),
        stripe_configured = %config.stripe_api_key.is_some(),
        vapi_configured = %config.vapi_api_key.is_some(),
        twilio_configured = %config.twilio_account_sid.is_some(),
        google_configured = %config.google_client_id.is_some(),
        plans_configured = config.stripe_prices.len(),
        "Service configuration loaded"
    );

    if config.auth_jwt_secret.is_empty() {
        tracing::warn!("AUTH_JWT_SECRET not set - user requests will be rejected");
    }

    // Initialize the store
    let store: Arc<dyn Store> = if let Some(url) = &config.database_url {
        tracing::info!("Connecting to PostgreSQL");
        Arc::new(PgStore::connect(url, config.database_max_connections).await?)
    } else {
        tracing::warn!("DATABASE_URL not set - using the in-memory store, data will not persist");
        Arc::new(MemoryStore::new())
    };

    // Build app state
    let state = AppState::new(store, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
