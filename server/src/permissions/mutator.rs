//! Write path for per-user permission overrides.
//!
//! Two name-resolution policies apply here and are part of the contract:
//! - Bulk updates drop names the catalog does not know and write the rest.
//! - Single updates fail with [`PermissionError::NotFound`] on an unknown
//!   permission.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::error::PermissionError;
use super::models::{
    OverrideAction, OverrideChange, OverrideReset, OverrideSummary, OverrideType, Permission,
    PermissionId, PermissionRef, UserId,
};
use super::store::PermissionStore;

/// Normalize a list of requested names: trimmed, non-empty, de-duplicated.
pub(crate) fn normalize_names(names: &[String]) -> BTreeSet<String> {
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve names through the catalog, dropping the unknown ones.
///
/// Returns the name-to-id map of the names found.
pub(crate) async fn resolve_names_lenient(
    store: &dyn PermissionStore,
    names: &BTreeSet<String>,
) -> Result<HashMap<String, PermissionId>, PermissionError> {
    if names.is_empty() {
        return Ok(HashMap::new());
    }

    let lookup: Vec<String> = names.iter().cloned().collect();
    let found = store.list_permissions_by_names(&lookup).await?;
    Ok(found.into_iter().map(|p| (p.name, p.id)).collect())
}

/// Resolve one permission strictly: unknown ids and names are an error.
pub async fn resolve_permission_strict(
    store: &dyn PermissionStore,
    target: &PermissionRef,
) -> Result<Permission, PermissionError> {
    let found = match target {
        PermissionRef::Id(id) => store.get_permission(*id).await?,
        PermissionRef::Name(name) => store
            .list_permissions_by_names(std::slice::from_ref(name))
            .await?
            .into_iter()
            .find(|p| &p.name == name),
    };

    found.ok_or_else(|| PermissionError::NotFound(target.to_string()))
}

/// Apply complete grant and revoke lists for a user.
///
/// Every resolved name is upserted, overwriting the previous directive for
/// that permission. A permission named in both lists ends up revoked.
/// Nothing is deleted; permissions absent from both lists keep whatever
/// override they had. The writes happen in one transaction.
#[tracing::instrument(skip(store, grant_names, revoke_names))]
pub async fn apply_overrides(
    store: &dyn PermissionStore,
    user_id: UserId,
    grant_names: &[String],
    revoke_names: &[String],
) -> Result<OverrideSummary, PermissionError> {
    let grant = normalize_names(grant_names);
    let revoke = normalize_names(revoke_names);
    let requested: BTreeSet<String> = grant.union(&revoke).cloned().collect();

    let resolved = resolve_names_lenient(store, &requested).await?;

    let mut writes: BTreeMap<PermissionId, OverrideType> = BTreeMap::new();
    let mut summary = OverrideSummary::default();

    for name in &grant {
        if revoke.contains(name) {
            continue;
        }
        if let Some(&id) = resolved.get(name) {
            writes.insert(id, OverrideType::Grant);
            summary.granted.insert(name.clone());
        }
    }
    for name in &revoke {
        if let Some(&id) = resolved.get(name) {
            writes.insert(id, OverrideType::Revoke);
            summary.revoked.insert(name.clone());
        }
    }
    summary.ignored = requested
        .into_iter()
        .filter(|name| !resolved.contains_key(name))
        .collect();

    if !summary.ignored.is_empty() {
        tracing::debug!(
            user_id,
            ignored = ?summary.ignored,
            "Dropping unknown permissions from bulk update"
        );
    }

    let entries: Vec<(PermissionId, OverrideType)> = writes.into_iter().collect();
    store.upsert_user_overrides(user_id, &entries).await?;

    tracing::info!(
        user_id,
        granted = summary.granted.len(),
        revoked = summary.revoked.len(),
        ignored = summary.ignored.len(),
        "Applied permission overrides"
    );

    Ok(summary)
}

/// Apply one override change.
///
/// `Grant` and `Revoke` upsert the directive; `Clear` deletes the override so
/// the role baseline applies again, and succeeds even when there was none.
#[tracing::instrument(skip(store))]
pub async fn apply_override(
    store: &dyn PermissionStore,
    user_id: UserId,
    target: &PermissionRef,
    action: OverrideAction,
) -> Result<OverrideChange, PermissionError> {
    let permission = resolve_permission_strict(store, target).await?;

    match action.directive() {
        Some(override_type) => {
            store
                .upsert_user_override(user_id, permission.id, override_type)
                .await?;
        }
        None => {
            let removed = store.delete_user_override(user_id, permission.id).await?;
            tracing::debug!(user_id, permission = %permission.name, removed, "Cleared override");
        }
    }

    tracing::info!(
        user_id,
        permission = %permission.name,
        action = ?action,
        "Applied permission override"
    );

    Ok(OverrideChange {
        permission_id: permission.id,
        permission_name: permission.name,
        action,
    })
}

/// Grant one permission to a user.
pub async fn grant_permission(
    store: &dyn PermissionStore,
    user_id: UserId,
    target: &PermissionRef,
) -> Result<OverrideChange, PermissionError> {
    apply_override(store, user_id, target, OverrideAction::Grant).await
}

/// Revoke one permission from a user.
pub async fn revoke_permission(
    store: &dyn PermissionStore,
    user_id: UserId,
    target: &PermissionRef,
) -> Result<OverrideChange, PermissionError> {
    apply_override(store, user_id, target, OverrideAction::Revoke).await
}

/// Remove every override of a user. Idempotent.
#[tracing::instrument(skip(store))]
pub async fn reset_overrides(
    store: &dyn PermissionStore,
    user_id: UserId,
) -> Result<OverrideReset, PermissionError> {
    let removed = store.delete_all_user_overrides(user_id).await?;
    tracing::info!(user_id, removed, "Reset permission overrides");
    Ok(OverrideReset { removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::memory::InMemoryPermissionStore;
    use crate::permissions::resolver::resolve_user_permissions;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| (*n).to_string()).collect()
    }

    fn set(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|n| (*n).to_string()).collect()
    }

    /// Instructor = {create_quiz, view_students}; user 7 is an Instructor.
    async fn instructor_store() -> InMemoryPermissionStore {
        let store = InMemoryPermissionStore::new();
        let create_quiz = store.add_permission("create_quiz").await;
        let view_students = store.add_permission("view_students").await;
        store.add_permission("edit_syllabus").await;
        store
            .replace_role_permissions("Instructor", &[create_quiz.id, view_students.id])
            .await
            .unwrap();
        store.set_user_role(7, "Instructor").await;
        store
    }

    #[tokio::test]
    async fn test_bulk_grant_and_revoke() {
        let store = instructor_store().await;

        let summary = apply_overrides(
            &store,
            7,
            &names(&["edit_syllabus"]),
            &names(&["view_students"]),
        )
        .await
        .unwrap();
        assert_eq!(summary.granted, set(&["edit_syllabus"]));
        assert_eq!(summary.revoked, set(&["view_students"]));

        let view = resolve_user_permissions(&store, 7, "User").await.unwrap();
        assert_eq!(view.effective_permissions, set(&["create_quiz", "edit_syllabus"]));
    }

    #[tokio::test]
    async fn test_bulk_drops_unknown_names() {
        let store = instructor_store().await;

        let summary = apply_overrides(&store, 7, &names(&["edit_syllabus", "fly"]), &[])
            .await
            .unwrap();

        assert_eq!(summary.granted, set(&["edit_syllabus"]));
        assert_eq!(summary.ignored, set(&["fly"]));
        assert_eq!(store.override_count(7).await, 1);
    }

    #[tokio::test]
    async fn test_bulk_same_name_in_both_lists_is_revoked() {
        let store = instructor_store().await;

        let summary = apply_overrides(
            &store,
            7,
            &names(&["create_quiz"]),
            &names(&["create_quiz"]),
        )
        .await
        .unwrap();
        assert!(summary.granted.is_empty());
        assert_eq!(summary.revoked, set(&["create_quiz"]));

        let view = resolve_user_permissions(&store, 7, "User").await.unwrap();
        assert!(!view.has("create_quiz"));
        assert_eq!(store.override_count(7).await, 1);
    }

    #[tokio::test]
    async fn test_bulk_keeps_unmentioned_overrides() {
        let store = instructor_store().await;
        apply_overrides(&store, 7, &names(&["edit_syllabus"]), &[])
            .await
            .unwrap();

        apply_overrides(&store, 7, &[], &names(&["view_students"]))
            .await
            .unwrap();

        let view = resolve_user_permissions(&store, 7, "User").await.unwrap();
        assert_eq!(view.granted_permissions, set(&["edit_syllabus"]));
        assert_eq!(view.revoked_permissions, set(&["view_students"]));
    }

    #[tokio::test]
    async fn test_grant_then_revoke_removes_baseline_permission() {
        let store = instructor_store().await;
        let target = PermissionRef::Name("create_quiz".into());

        grant_permission(&store, 7, &target).await.unwrap();
        revoke_permission(&store, 7, &target).await.unwrap();

        let view = resolve_user_permissions(&store, 7, "User").await.unwrap();
        assert!(!view.has("create_quiz"));
        assert_eq!(store.override_count(7).await, 1);
    }

    #[tokio::test]
    async fn test_single_update_unknown_name_is_not_found() {
        let store = instructor_store().await;

        let err = apply_override(
            &store,
            7,
            &PermissionRef::Name("fly".into()),
            OverrideAction::Grant,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PermissionError::NotFound(_)));

        let err = apply_override(&store, 7, &PermissionRef::Id(999), OverrideAction::Clear)
            .await
            .unwrap_err();
        assert!(matches!(err, PermissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_clear_without_existing_override_succeeds() {
        let store = instructor_store().await;

        let change = apply_override(
            &store,
            7,
            &PermissionRef::Name("create_quiz".into()),
            OverrideAction::Clear,
        )
        .await
        .unwrap();
        assert_eq!(change.permission_name, "create_quiz");
        assert_eq!(store.override_count(7).await, 0);
    }

    #[tokio::test]
    async fn test_clear_restores_baseline() {
        let store = instructor_store().await;
        let target = PermissionRef::Name("view_students".into());
        revoke_permission(&store, 7, &target).await.unwrap();

        apply_override(&store, 7, &target, OverrideAction::Clear)
            .await
            .unwrap();

        let view = resolve_user_permissions(&store, 7, "User").await.unwrap();
        assert!(view.has("view_students"));
    }

    #[tokio::test]
    async fn test_reset_overrides_restores_baseline_and_is_idempotent() {
        let store = instructor_store().await;
        apply_overrides(
            &store,
            7,
            &names(&["edit_syllabus"]),
            &names(&["create_quiz"]),
        )
        .await
        .unwrap();

        assert_eq!(reset_overrides(&store, 7).await.unwrap().removed, 2);
        assert_eq!(reset_overrides(&store, 7).await.unwrap().removed, 0);

        let view = resolve_user_permissions(&store, 7, "User").await.unwrap();
        assert_eq!(view.effective_permissions, view.role_permissions);
    }

    #[tokio::test]
    async fn test_revoke_outside_baseline_leaves_effective_set_unchanged() {
        let store = instructor_store().await;
        let before = resolve_user_permissions(&store, 7, "User").await.unwrap();

        revoke_permission(&store, 7, &PermissionRef::Name("edit_syllabus".into()))
            .await
            .unwrap();

        let after = resolve_user_permissions(&store, 7, "User").await.unwrap();
        assert_eq!(before.effective_permissions, after.effective_permissions);
    }
}
