//! Permission Error Types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::api::ApiResponse;

#[derive(Debug, Error)]
pub enum PermissionError {
    /// A strict lookup named a permission the catalog does not contain.
    #[error("Permission not found: {0}")]
    NotFound(String),

    /// Malformed request, rejected before any storage call.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Persistence backend failure. Not retried here.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl IntoResponse for PermissionError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::Storage(err) => {
                tracing::error!("Storage error in permissions: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Permission storage unavailable".to_string(),
                )
            }
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let not_found = PermissionError::NotFound("create_quiz".into());
        assert!(not_found.to_string().contains("not found"));
        assert!(not_found.to_string().contains("create_quiz"));

        let validation = PermissionError::Validation("permissionId is required".into());
        assert!(validation.to_string().contains("Validation failed"));

        let storage = PermissionError::Storage(sqlx::Error::PoolTimedOut);
        assert!(storage.to_string().contains("Storage error"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PermissionError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PermissionError::Validation("x".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PermissionError::Storage(sqlx::Error::PoolClosed)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
