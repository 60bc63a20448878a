//! Role policy management: the baseline permissions a role confers.

use std::collections::BTreeSet;

use super::error::PermissionError;
use super::models::{PermissionId, RolePermissions};
use super::mutator::{normalize_names, resolve_names_lenient};
use super::store::PermissionStore;

/// Longest accepted role label.
pub const MAX_ROLE_LEN: usize = 64;

fn validate_role(role: &str) -> Result<&str, PermissionError> {
    let role = role.trim();
    if role.is_empty() || role.len() > MAX_ROLE_LEN {
        return Err(PermissionError::Validation(format!(
            "Role must be 1-{MAX_ROLE_LEN} characters"
        )));
    }
    Ok(role)
}

/// Get the baseline permission names of a role.
///
/// A role with no rows has an empty baseline.
pub async fn get_role_permissions(
    store: &dyn PermissionStore,
    role: &str,
) -> Result<RolePermissions, PermissionError> {
    let role = validate_role(role)?;
    let permissions = store
        .get_role_permission_names(role)
        .await?
        .into_iter()
        .collect();

    Ok(RolePermissions {
        role: role.to_string(),
        permissions,
        ignored: BTreeSet::new(),
    })
}

/// Replace a role's baseline with `names`.
///
/// Not incremental: the result is exactly the subset of `names` present in
/// the catalog. Unknown names are dropped and reported in `ignored`.
#[tracing::instrument(skip(store, names))]
pub async fn set_role_permissions(
    store: &dyn PermissionStore,
    role: &str,
    names: &[String],
) -> Result<RolePermissions, PermissionError> {
    let role = validate_role(role)?;
    let requested = normalize_names(names);
    let resolved = resolve_names_lenient(store, &requested).await?;

    let mut ids: Vec<PermissionId> = resolved.values().copied().collect();
    ids.sort_unstable();
    store.replace_role_permissions(role, &ids).await?;

    let (permissions, ignored): (BTreeSet<String>, BTreeSet<String>) = requested
        .into_iter()
        .partition(|name| resolved.contains_key(name));

    tracing::info!(
        role,
        permissions = permissions.len(),
        ignored = ignored.len(),
        "Replaced role permissions"
    );

    Ok(RolePermissions {
        role: role.to_string(),
        permissions,
        ignored,
    })
}
