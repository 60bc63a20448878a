//! In-memory permission store.
//!
//! Same contract as the `PostgreSQL` store. Every operation holds the lock
//! for its whole duration, so batch writes are atomic for readers.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::models::{OverrideType, Permission, PermissionId, UserId, UserOverride};
use super::store::PermissionStore;

#[derive(Debug, Clone, Copy)]
struct OverrideRecord {
    override_type: OverrideType,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Catalog keyed by id.
    permissions: BTreeMap<PermissionId, String>,
    next_permission_id: PermissionId,
    role_permissions: HashMap<String, BTreeSet<PermissionId>>,
    user_roles: HashMap<UserId, String>,
    /// Keyed by `(user_id, permission_id)`: one row per pair.
    overrides: BTreeMap<(UserId, PermissionId), OverrideRecord>,
}

impl Inner {
    fn find_by_name(&self, name: &str) -> Option<Permission> {
        self.permissions
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(&id, n)| Permission {
                id,
                name: n.clone(),
            })
    }
}

/// Permission store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    inner: RwLock<Inner>,
}

impl InMemoryPermissionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a catalog entry. Returns the existing entry if the name is taken.
    pub async fn add_permission(&self, name: &str) -> Permission {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.find_by_name(name) {
            return existing;
        }
        inner.next_permission_id += 1;
        let id = inner.next_permission_id;
        inner.permissions.insert(id, name.to_string());
        Permission {
            id,
            name: name.to_string(),
        }
    }

    /// Record the role of a user.
    pub async fn set_user_role(&self, user_id: UserId, role: &str) {
        self.inner
            .write()
            .await
            .user_roles
            .insert(user_id, role.to_string());
    }

    /// Number of override rows stored for a user.
    pub async fn override_count(&self, user_id: UserId) -> usize {
        self.inner
            .read()
            .await
            .overrides
            .range((user_id, PermissionId::MIN)..=(user_id, PermissionId::MAX))
            .count()
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn list_permissions(&self) -> sqlx::Result<Vec<Permission>> {
        let inner = self.inner.read().await;
        let mut all: Vec<Permission> = inner
            .permissions
            .iter()
            .map(|(&id, name)| Permission {
                id,
                name: name.clone(),
            })
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn list_permissions_by_names(&self, names: &[String]) -> sqlx::Result<Vec<Permission>> {
        let inner = self.inner.read().await;
        let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        let mut found: Vec<Permission> = wanted
            .into_iter()
            .filter_map(|name| inner.find_by_name(name))
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn get_permission(&self, id: PermissionId) -> sqlx::Result<Option<Permission>> {
        let inner = self.inner.read().await;
        Ok(inner.permissions.get(&id).map(|name| Permission {
            id,
            name: name.clone(),
        }))
    }

    async fn get_role_permission_names(&self, role: &str) -> sqlx::Result<Vec<String>> {
        let inner = self.inner.read().await;
        let mut names: Vec<String> = inner
            .role_permissions
            .get(role)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.permissions.get(id).cloned())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn replace_role_permissions(
        &self,
        role: &str,
        permission_ids: &[PermissionId],
    ) -> sqlx::Result<()> {
        let mut inner = self.inner.write().await;
        let ids: BTreeSet<PermissionId> = permission_ids
            .iter()
            .copied()
            .filter(|id| inner.permissions.contains_key(id))
            .collect();
        inner.role_permissions.insert(role.to_string(), ids);
        Ok(())
    }

    async fn get_user_role(&self, user_id: UserId) -> sqlx::Result<Option<String>> {
        Ok(self.inner.read().await.user_roles.get(&user_id).cloned())
    }

    async fn get_user_overrides(&self, user_id: UserId) -> sqlx::Result<Vec<UserOverride>> {
        let inner = self.inner.read().await;
        let mut overrides: Vec<UserOverride> = inner
            .overrides
            .range((user_id, PermissionId::MIN)..=(user_id, PermissionId::MAX))
            .filter_map(|(&(_, permission_id), record)| {
                inner
                    .permissions
                    .get(&permission_id)
                    .map(|name| UserOverride {
                        permission_name: name.clone(),
                        override_type: record.override_type,
                        updated_at: record.updated_at,
                    })
            })
            .collect();
        overrides.sort_by(|a, b| a.permission_name.cmp(&b.permission_name));
        Ok(overrides)
    }

    async fn upsert_user_override(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
        override_type: OverrideType,
    ) -> sqlx::Result<()> {
        self.upsert_user_overrides(user_id, &[(permission_id, override_type)])
            .await
    }

    async fn upsert_user_overrides(
        &self,
        user_id: UserId,
        entries: &[(PermissionId, OverrideType)],
    ) -> sqlx::Result<()> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        for &(permission_id, override_type) in entries {
            if !inner.permissions.contains_key(&permission_id) {
                continue;
            }
            inner.overrides.insert(
                (user_id, permission_id),
                OverrideRecord {
                    override_type,
                    updated_at: now,
                },
            );
        }
        Ok(())
    }

    async fn delete_user_override(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> sqlx::Result<bool> {
        Ok(self
            .inner
            .write()
            .await
            .overrides
            .remove(&(user_id, permission_id))
            .is_some())
    }

    async fn delete_all_user_overrides(&self, user_id: UserId) -> sqlx::Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.overrides.len();
        inner.overrides.retain(|&(uid, _), _| uid != user_id);
        Ok((before - inner.overrides.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_permission_is_idempotent_by_name() {
        let store = InMemoryPermissionStore::new();
        let first = store.add_permission("create_quiz").await;
        let again = store.add_permission("create_quiz").await;
        assert_eq!(first, again);
        assert_eq!(store.list_permissions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_by_names_skips_unknown() {
        let store = InMemoryPermissionStore::new();
        store.add_permission("create_quiz").await;
        let found = store
            .list_permissions_by_names(&["create_quiz".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "create_quiz");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_existing_pair() {
        let store = InMemoryPermissionStore::new();
        let perm = store.add_permission("create_quiz").await;

        store
            .upsert_user_override(1, perm.id, OverrideType::Grant)
            .await
            .unwrap();
        store
            .upsert_user_override(1, perm.id, OverrideType::Revoke)
            .await
            .unwrap();

        assert_eq!(store.override_count(1).await, 1);
        let overrides = store.get_user_overrides(1).await.unwrap();
        assert_eq!(overrides[0].override_type, OverrideType::Revoke);
    }

    #[tokio::test]
    async fn test_delete_all_only_touches_one_user() {
        let store = InMemoryPermissionStore::new();
        let perm = store.add_permission("create_quiz").await;
        store
            .upsert_user_override(1, perm.id, OverrideType::Grant)
            .await
            .unwrap();
        store
            .upsert_user_override(2, perm.id, OverrideType::Grant)
            .await
            .unwrap();

        assert_eq!(store.delete_all_user_overrides(1).await.unwrap(), 1);
        assert_eq!(store.delete_all_user_overrides(1).await.unwrap(), 0);
        assert_eq!(store.override_count(2).await, 1);
    }
}
