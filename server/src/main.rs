//! LMS Server - Main Entry Point
//!
//! Permission resolution backend for the e-learning platform.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use lms_server::{api, config, db, permissions::PgPermissionStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lms_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        default_role = %config.default_role,
        "Starting LMS Server"
    );

    // Initialize database
    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;

    // Build application state
    let store = Arc::new(PgPermissionStore::new(db_pool));
    let state = api::AppState::new(store, config.clone());

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");

    Ok(())
}
