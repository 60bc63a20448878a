//! Models for the permission system.
//!
//! Storage rows, the override directive enums and the request/response
//! bodies accepted by the permission endpoints. JSON keys are camelCase.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use validator::{Validate, ValidationError};

use super::error::PermissionError;

/// Role assumed when a user has no role record.
pub const DEFAULT_ROLE: &str = "User";

/// Longest accepted permission name.
pub const MAX_PERMISSION_NAME_LEN: usize = 100;

pub type UserId = i64;
pub type PermissionId = i32;

// ============================================================================
// Storage Models
// ============================================================================

/// Catalog entry. `name` is the external identifier, `id` is only used for joins.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
}

/// Direction of a per-user override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideType {
    Grant,
    Revoke,
}

impl OverrideType {
    /// Value stored in the `type` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Revoke => "revoke",
        }
    }
}

impl fmt::Display for OverrideType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown override type: {0}")]
pub struct UnknownOverrideType(pub String);

impl TryFrom<String> for OverrideType {
    type Error = UnknownOverrideType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "grant" => Ok(Self::Grant),
            "revoke" => Ok(Self::Revoke),
            _ => Err(UnknownOverrideType(value)),
        }
    }
}

/// A user's override joined with the permission name.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverride {
    pub permission_name: String,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub override_type: OverrideType,
    pub updated_at: DateTime<Utc>,
}

/// What a single-permission update does to the stored override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideAction {
    Grant,
    Revoke,
    /// Remove the override so the role baseline applies again.
    Clear,
}

impl OverrideAction {
    /// The directive to upsert, or `None` when the row should be deleted.
    #[must_use]
    pub const fn directive(self) -> Option<OverrideType> {
        match self {
            Self::Grant => Some(OverrideType::Grant),
            Self::Revoke => Some(OverrideType::Revoke),
            Self::Clear => None,
        }
    }
}

/// Reference to a catalog entry by surrogate id or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionRef {
    Id(PermissionId),
    Name(String),
}

impl fmt::Display for PermissionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Resolved permissions for a user, with the provenance of each entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePermissions {
    pub user_id: UserId,
    pub role: String,
    pub effective_permissions: BTreeSet<String>,
    pub role_permissions: BTreeSet<String>,
    pub granted_permissions: BTreeSet<String>,
    pub revoked_permissions: BTreeSet<String>,
}

impl EffectivePermissions {
    #[must_use]
    pub fn has(&self, permission: &str) -> bool {
        self.effective_permissions.contains(permission)
    }
}

/// Outcome of a bulk override update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideSummary {
    pub granted: BTreeSet<String>,
    pub revoked: BTreeSet<String>,
    /// Requested names with no catalog entry.
    pub ignored: BTreeSet<String>,
}

/// Outcome of a single-permission update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideChange {
    pub permission_id: PermissionId,
    pub permission_name: String,
    pub action: OverrideAction,
}

/// Result of resetting a user's overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideReset {
    pub removed: u64,
}

/// Role baseline as returned by the role policy endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissions {
    pub role: String,
    pub permissions: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub ignored: BTreeSet<String>,
}

// ============================================================================
// Request Types
// ============================================================================

fn validate_permission_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_PERMISSION_NAME_LEN {
        let mut err = ValidationError::new("permission_name");
        err.message = Some(
            format!("Permission names must be 1-{MAX_PERMISSION_NAME_LEN} characters").into(),
        );
        return Err(err);
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn validate_permission_names(names: &Vec<String>) -> Result<(), ValidationError> {
    names
        .iter()
        .map(String::as_str)
        .try_for_each(validate_permission_name)
}

/// Bulk override update: complete grant and revoke lists.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkOverrideRequest {
    #[validate(
        length(max = 500, message = "Too many permissions in one request"),
        custom(function = "validate_permission_names")
    )]
    pub grant_permissions: Option<Vec<String>>,
    #[validate(
        length(max = 500, message = "Too many permissions in one request"),
        custom(function = "validate_permission_names")
    )]
    pub revoke_permissions: Option<Vec<String>>,
}

impl BulkOverrideRequest {
    /// Split into `(grant, revoke)` lists.
    ///
    /// At least one list must be present; an explicitly empty list is a valid no-op.
    pub fn into_lists(self) -> Result<(Vec<String>, Vec<String>), PermissionError> {
        if self.grant_permissions.is_none() && self.revoke_permissions.is_none() {
            return Err(PermissionError::Validation(
                "grantPermissions or revokePermissions is required".into(),
            ));
        }
        Ok((
            self.grant_permissions.unwrap_or_default(),
            self.revoke_permissions.unwrap_or_default(),
        ))
    }
}

/// Target of a single-permission update or of the grant/revoke shortcuts.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PermissionTarget {
    pub permission_id: Option<PermissionId>,
    #[validate(custom(function = "validate_permission_name"))]
    pub permission_name: Option<String>,
}

impl PermissionTarget {
    /// The id wins when both are supplied; the name is only resolved without one.
    pub fn permission_ref(&self) -> Result<PermissionRef, PermissionError> {
        match (self.permission_id, &self.permission_name) {
            (Some(id), _) => Ok(PermissionRef::Id(id)),
            (None, Some(name)) if !name.trim().is_empty() => {
                Ok(PermissionRef::Name(name.trim().to_string()))
            }
            (None, Some(_)) => Err(PermissionError::Validation(
                "permissionName cannot be blank".into(),
            )),
            (None, None) => Err(PermissionError::Validation(
                "permissionId or permissionName is required".into(),
            )),
        }
    }
}

/// Single/legacy override update. A missing `type` resets the permission.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SingleOverrideRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub target: PermissionTarget,
    #[serde(rename = "type")]
    pub action: Option<OverrideAction>,
}

impl SingleOverrideRequest {
    pub fn into_parts(self) -> Result<(PermissionRef, OverrideAction), PermissionError> {
        let target = self.target.permission_ref()?;
        Ok((target, self.action.unwrap_or(OverrideAction::Clear)))
    }
}

/// Body accepted by the combined endpoint that serves both current and
/// legacy clients.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissionsUpdate {
    #[serde(flatten)]
    #[validate(nested)]
    pub bulk: BulkOverrideRequest,
    #[serde(flatten)]
    #[validate(nested)]
    pub single: SingleOverrideRequest,
}

/// Which operation a combined-endpoint body asks for.
#[derive(Debug, Clone)]
pub enum PermissionUpdate {
    Bulk(BulkOverrideRequest),
    Single(SingleOverrideRequest),
}

impl UserPermissionsUpdate {
    /// Classify the body by the fields it carries.
    ///
    /// A body naming both shapes, or neither, is rejected.
    pub fn classify(self) -> Result<PermissionUpdate, PermissionError> {
        let is_bulk =
            self.bulk.grant_permissions.is_some() || self.bulk.revoke_permissions.is_some();
        let is_single = self.single.target.permission_id.is_some()
            || self.single.target.permission_name.is_some();

        // `type` only belongs to single updates
        if is_bulk && self.single.action.is_some() {
            return Err(PermissionError::Validation(
                "type cannot be combined with grantPermissions/revokePermissions".into(),
            ));
        }

        match (is_bulk, is_single) {
            (true, false) => Ok(PermissionUpdate::Bulk(self.bulk)),
            (false, true) => Ok(PermissionUpdate::Single(self.single)),
            (true, true) => Err(PermissionError::Validation(
                "Request mixes bulk lists with a single permission update".into(),
            )),
            (false, false) => Err(PermissionError::Validation(
                "Request must contain grantPermissions/revokePermissions or permissionId/permissionName"
                    .into(),
            )),
        }
    }
}

/// Full replacement of a role's baseline.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetRolePermissionsRequest {
    #[validate(
        length(max = 500, message = "Too many permissions in one request"),
        custom(function = "validate_permission_names")
    )]
    pub permissions: Vec<String>,
}
