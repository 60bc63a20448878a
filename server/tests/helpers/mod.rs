//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum
//! router backed by an in-memory permission store, plus JSON helpers.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use lms_server::api::{create_router, AppState};
use lms_server::config::Config;
use lms_server::permissions::{InMemoryPermissionStore, PermissionStore};
use tower::ServiceExt;

/// Permissions registered in every test catalog.
pub const CATALOG: &[&str] = &[
    "create_quiz",
    "view_students",
    "edit_syllabus",
    "manage_coupons",
];

/// The user with the "Instructor" role in the seeded store.
pub const INSTRUCTOR_ID: i64 = 7;

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryPermissionStore>,
    pub config: Arc<Config>,
}

impl TestApp {
    /// Create a test app with an empty store.
    pub async fn empty() -> Self {
        let store = Arc::new(InMemoryPermissionStore::new());
        let config = Config::default_for_test();
        let state = AppState::new(store.clone(), config.clone());

        Self {
            router: create_router(state),
            store,
            config: Arc::new(config),
        }
    }

    /// Create a test app with the catalog registered and
    /// `Instructor = {create_quiz, view_students}` assigned to user 7.
    pub async fn new() -> Self {
        let app = Self::empty().await;
        let mut ids = Vec::new();
        for name in CATALOG {
            let permission = app.store.add_permission(name).await;
            if matches!(*name, "create_quiz" | "view_students") {
                ids.push(permission.id);
            }
        }
        app.store
            .replace_role_permissions("Instructor", &ids)
            .await
            .expect("Failed to seed Instructor role");
        app.store.set_user_role(INSTRUCTOR_ID, "Instructor").await;
        app
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Send a bodiless request.
    pub async fn send(&self, method: Method, uri: &str) -> Response<Body> {
        let req = Self::request(method, uri)
            .body(Body::empty())
            .expect("Failed to build request");
        self.oneshot(req).await
    }

    /// Send a JSON request.
    pub async fn send_json(
        &self,
        method: Method,
        uri: &str,
        body: &serde_json::Value,
    ) -> Response<Body> {
        let req = Self::request(method, uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request");
        self.oneshot(req).await
    }

    /// Fetch the effective permission view of a user.
    pub async fn effective(&self, user_id: i64) -> serde_json::Value {
        let resp = self
            .send(Method::GET, &format!("/api/users/{user_id}/permissions"))
            .await;
        assert_eq!(resp.status(), 200, "Resolving user {user_id} should succeed");
        body_to_json(resp).await
    }
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

/// Extract a JSON array of strings.
pub fn string_list(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .unwrap_or_else(|| panic!("Expected array, got {value}"))
        .iter()
        .map(|v| v.as_str().expect("Expected string").to_string())
        .collect()
}
