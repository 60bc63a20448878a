//! Permission resolution logic.
//!
//! Computes the effective permissions of a user from the role baseline and
//! the user's overrides.

use std::collections::BTreeSet;

use super::error::PermissionError;
use super::models::{EffectivePermissions, OverrideType, UserId, UserOverride};
use super::store::PermissionStore;

/// Compose a role baseline with a user's overrides.
///
/// Resolution order:
/// 1. Start with the role baseline
/// 2. Add every granted permission
/// 3. Remove every revoked permission
///
/// Revokes are applied last, so a revoke wins over both the baseline and a
/// grant for the same permission.
pub fn compute_effective_permissions(
    user_id: UserId,
    role: &str,
    role_permissions: BTreeSet<String>,
    overrides: &[UserOverride],
) -> EffectivePermissions {
    let mut granted = BTreeSet::new();
    let mut revoked = BTreeSet::new();

    for ovr in overrides {
        match ovr.override_type {
            OverrideType::Grant => granted.insert(ovr.permission_name.clone()),
            OverrideType::Revoke => revoked.insert(ovr.permission_name.clone()),
        };
    }

    let effective = role_permissions
        .union(&granted)
        .filter(|name| !revoked.contains(*name))
        .cloned()
        .collect();

    EffectivePermissions {
        user_id,
        role: role.to_string(),
        effective_permissions: effective,
        role_permissions,
        granted_permissions: granted,
        revoked_permissions: revoked,
    }
}

/// Resolve a user's permissions for an already known role.
#[tracing::instrument(skip(store))]
pub async fn resolve_for_role(
    store: &dyn PermissionStore,
    user_id: UserId,
    role: &str,
) -> Result<EffectivePermissions, PermissionError> {
    let role_permissions: BTreeSet<String> = store
        .get_role_permission_names(role)
        .await?
        .into_iter()
        .collect();
    let overrides = store.get_user_overrides(user_id).await?;

    Ok(compute_effective_permissions(
        user_id,
        role,
        role_permissions,
        &overrides,
    ))
}

/// Resolve a user's permissions, looking up the role first.
///
/// A user with no record gets `default_role` rather than an error.
#[tracing::instrument(skip(store))]
pub async fn resolve_user_permissions(
    store: &dyn PermissionStore,
    user_id: UserId,
    default_role: &str,
) -> Result<EffectivePermissions, PermissionError> {
    let role = match store.get_user_role(user_id).await? {
        Some(role) => role,
        None => {
            tracing::debug!(user_id, default_role, "No role record, using default role");
            default_role.to_string()
        }
    };

    resolve_for_role(store, user_id, &role).await
}

/// Check a single permission for a user.
pub async fn has_permission(
    store: &dyn PermissionStore,
    user_id: UserId,
    default_role: &str,
    permission: &str,
) -> Result<bool, PermissionError> {
    let view = resolve_user_permissions(store, user_id, default_role).await?;
    Ok(view.has(permission))
}
