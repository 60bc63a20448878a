//! Permission system.
//!
//! Effective permissions of a user are the role baseline plus per-user
//! overrides:
//! - Role policy: permissions every user of a role gets by default
//! - Overrides: per-user `grant` or `revoke` directives, one per permission
//!
//! `(role baseline ∪ granted) \ revoked` is recomputed on every query.

pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod mutator;
pub mod policy;
pub mod queries;
pub mod resolver;
pub mod store;


use axum::{
    routing::{get, post, put},
    Router,
};

use crate::api::AppState;

pub use error::PermissionError;
pub use memory::InMemoryPermissionStore;
pub use models::*;
pub use mutator::{
    apply_override, apply_overrides, grant_permission, reset_overrides, revoke_permission,
};
pub use policy::{get_role_permissions, set_role_permissions};
pub use resolver::{
    compute_effective_permissions, has_permission, resolve_for_role, resolve_user_permissions,
};
pub use store::{PermissionStore, PgPermissionStore};

/// Create the permission router.
///
/// Mounted under `/api`. Callers are expected to sit behind the platform's
/// authentication layer.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/permissions", get(handlers::list_permissions))
        .route(
            "/users/{user_id}/permissions",
            get(handlers::get_user_permissions)
                .put(handlers::update_user_permissions)
                .delete(handlers::reset_user_permissions),
        )
        .route(
            "/users/{user_id}/permissions/bulk",
            put(handlers::bulk_update_user_permissions),
        )
        .route(
            "/users/{user_id}/permissions/single",
            put(handlers::single_update_user_permission),
        )
        .route(
            "/users/{user_id}/permissions/grant",
            post(handlers::grant_user_permission),
        )
        .route(
            "/users/{user_id}/permissions/revoke",
            post(handlers::revoke_user_permission),
        )
        .route(
            "/roles/{role}/permissions",
            get(handlers::get_role_permissions).put(handlers::set_role_permissions),
        )
}
