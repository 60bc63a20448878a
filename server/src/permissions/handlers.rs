//! Permission API handlers.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request, State},
    http::request::Parts,
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use validator::Validate;

use crate::api::{ApiResponse, AppState};

use super::error::PermissionError;
use super::models::{
    BulkOverrideRequest, EffectivePermissions, OverrideChange, OverrideReset, OverrideSummary,
    Permission, PermissionTarget, PermissionUpdate, RolePermissions, SetRolePermissionsRequest,
    SingleOverrideRequest, UserId, UserPermissionsUpdate,
};
use super::{mutator, policy, resolver};

// ============================================================================
// Extractor
// ============================================================================

/// JSON body that is validated before the handler runs.
///
/// Malformed JSON and validation failures are both reported as
/// [`PermissionError::Validation`], inside the usual response envelope.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = PermissionError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| PermissionError::Validation(e.body_text()))?;
        value
            .validate()
            .map_err(|e| PermissionError::Validation(e.to_string()))?;
        Ok(Self(value))
    }
}

/// Path parameters whose rejection is reported in the response envelope.
pub struct ValidatedPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = PermissionError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| PermissionError::Validation(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Result of the combined update endpoint.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UpdateOutcome {
    Bulk(OverrideSummary),
    Single(OverrideChange),
}

// ============================================================================
// Catalog
// ============================================================================

/// List the permission catalog.
///
/// `GET /api/permissions`
#[tracing::instrument(skip(state))]
pub async fn list_permissions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Permission>>>, PermissionError> {
    let permissions = state.store.list_permissions().await?;
    Ok(Json(ApiResponse::ok(permissions)))
}

// ============================================================================
// User Overrides
// ============================================================================

/// Get the effective permissions of a user with their provenance.
///
/// `GET /api/users/:user_id/permissions`
#[tracing::instrument(skip(state))]
pub async fn get_user_permissions(
    State(state): State<AppState>,
    ValidatedPath(user_id): ValidatedPath<UserId>,
) -> Result<Json<ApiResponse<EffectivePermissions>>, PermissionError> {
    let view = resolver::resolve_user_permissions(
        state.store.as_ref(),
        user_id,
        &state.config.default_role,
    )
    .await?;
    Ok(Json(ApiResponse::ok(view)))
}

/// Combined update endpoint for current and legacy clients.
///
/// `PUT /api/users/:user_id/permissions`
///
/// Bodies with `grantPermissions`/`revokePermissions` are bulk updates;
/// bodies with `permissionId`/`permissionName` are single updates.
#[tracing::instrument(skip(state, body))]
pub async fn update_user_permissions(
    State(state): State<AppState>,
    ValidatedPath(user_id): ValidatedPath<UserId>,
    ValidatedJson(body): ValidatedJson<UserPermissionsUpdate>,
) -> Result<Json<ApiResponse<UpdateOutcome>>, PermissionError> {
    match body.classify()? {
        PermissionUpdate::Bulk(bulk) => {
            let summary = bulk_update(&state, user_id, bulk).await?;
            Ok(Json(ApiResponse::ok_with_message(
                UpdateOutcome::Bulk(summary),
                "Permissions updated",
            )))
        }
        PermissionUpdate::Single(single) => {
            let change = single_update(&state, user_id, single).await?;
            Ok(Json(ApiResponse::ok_with_message(
                UpdateOutcome::Single(change),
                "Permission updated",
            )))
        }
    }
}

/// Apply grant and revoke lists.
///
/// `PUT /api/users/:user_id/permissions/bulk`
#[tracing::instrument(skip(state, body))]
pub async fn bulk_update_user_permissions(
    State(state): State<AppState>,
    ValidatedPath(user_id): ValidatedPath<UserId>,
    ValidatedJson(body): ValidatedJson<BulkOverrideRequest>,
) -> Result<Json<ApiResponse<OverrideSummary>>, PermissionError> {
    let summary = bulk_update(&state, user_id, body).await?;
    Ok(Json(ApiResponse::ok_with_message(
        summary,
        "Permissions updated",
    )))
}

/// Set, flip or clear one override.
///
/// `PUT /api/users/:user_id/permissions/single`
#[tracing::instrument(skip(state, body))]
pub async fn single_update_user_permission(
    State(state): State<AppState>,
    ValidatedPath(user_id): ValidatedPath<UserId>,
    ValidatedJson(body): ValidatedJson<SingleOverrideRequest>,
) -> Result<Json<ApiResponse<OverrideChange>>, PermissionError> {
    let change = single_update(&state, user_id, body).await?;
    Ok(Json(ApiResponse::ok_with_message(change, "Permission updated")))
}

/// `POST /api/users/:user_id/permissions/grant`
#[tracing::instrument(skip(state, body))]
pub async fn grant_user_permission(
    State(state): State<AppState>,
    ValidatedPath(user_id): ValidatedPath<UserId>,
    ValidatedJson(body): ValidatedJson<PermissionTarget>,
) -> Result<Json<ApiResponse<OverrideChange>>, PermissionError> {
    let target = body.permission_ref()?;
    let change = mutator::grant_permission(state.store.as_ref(), user_id, &target).await?;
    Ok(Json(ApiResponse::ok_with_message(change, "Permission granted")))
}

/// `POST /api/users/:user_id/permissions/revoke`
#[tracing::instrument(skip(state, body))]
pub async fn revoke_user_permission(
    State(state): State<AppState>,
    ValidatedPath(user_id): ValidatedPath<UserId>,
    ValidatedJson(body): ValidatedJson<PermissionTarget>,
) -> Result<Json<ApiResponse<OverrideChange>>, PermissionError> {
    let target = body.permission_ref()?;
    let change = mutator::revoke_permission(state.store.as_ref(), user_id, &target).await?;
    Ok(Json(ApiResponse::ok_with_message(change, "Permission revoked")))
}

/// Remove every override so the user falls back to the role baseline.
///
/// `DELETE /api/users/:user_id/permissions`
#[tracing::instrument(skip(state))]
pub async fn reset_user_permissions(
    State(state): State<AppState>,
    ValidatedPath(user_id): ValidatedPath<UserId>,
) -> Result<Json<ApiResponse<OverrideReset>>, PermissionError> {
    let reset = mutator::reset_overrides(state.store.as_ref(), user_id).await?;
    Ok(Json(ApiResponse::ok_with_message(
        reset,
        "Permissions reset to role defaults",
    )))
}

async fn bulk_update(
    state: &AppState,
    user_id: UserId,
    body: BulkOverrideRequest,
) -> Result<OverrideSummary, PermissionError> {
    let (grant, revoke) = body.into_lists()?;
    mutator::apply_overrides(state.store.as_ref(), user_id, &grant, &revoke).await
}

async fn single_update(
    state: &AppState,
    user_id: UserId,
    body: SingleOverrideRequest,
) -> Result<OverrideChange, PermissionError> {
    let (target, action) = body.into_parts()?;
    mutator::apply_override(state.store.as_ref(), user_id, &target, action).await
}

// ============================================================================
// Role Policy
// ============================================================================

/// `GET /api/roles/:role/permissions`
#[tracing::instrument(skip(state))]
pub async fn get_role_permissions(
    State(state): State<AppState>,
    ValidatedPath(role): ValidatedPath<String>,
) -> Result<Json<ApiResponse<RolePermissions>>, PermissionError> {
    let permissions = policy::get_role_permissions(state.store.as_ref(), &role).await?;
    Ok(Json(ApiResponse::ok(permissions)))
}

/// Replace the baseline of a role.
///
/// `PUT /api/roles/:role/permissions`
#[tracing::instrument(skip(state, body))]
pub async fn set_role_permissions(
    State(state): State<AppState>,
    ValidatedPath(role): ValidatedPath<String>,
    ValidatedJson(body): ValidatedJson<SetRolePermissionsRequest>,
) -> Result<Json<ApiResponse<RolePermissions>>, PermissionError> {
    let updated =
        policy::set_role_permissions(state.store.as_ref(), &role, &body.permissions).await?;
    Ok(Json(ApiResponse::ok_with_message(
        updated,
        "Role permissions updated",
    )))
}
