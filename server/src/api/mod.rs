//! API Router and Application State
//!
//! Central routing configuration and shared state.

mod response;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::Config, permissions, permissions::PermissionStore};

pub use response::ApiResponse;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Permission storage backend
    pub store: Arc<dyn PermissionStore>,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(store: Arc<dyn PermissionStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api", permissions::router())
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Number of catalog entries, `None` if storage is unreachable
    permissions: Option<usize>,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let permissions = match state.store.list_permissions().await {
        Ok(all) => Some(all.len()),
        Err(e) => {
            tracing::warn!("Health check could not reach permission storage: {}", e);
            None
        }
    };

    Json(ApiResponse::ok(HealthResponse {
        status: if permissions.is_some() { "ok" } else { "degraded" },
        permissions,
    }))
}
