//! Storage collaborator for permission resolution.
//!
//! The resolver, the override mutator and the role policy manager only see
//! [`PermissionStore`]. `PostgreSQL` is the production backend; the in-memory
//! store in [`super::memory`] backs tests.

use async_trait::async_trait;
use sqlx::PgPool;

use super::models::{OverrideType, Permission, PermissionId, UserId, UserOverride};
use super::queries;

/// Data access required by the permission core.
///
/// Multi-row writes (`replace_role_permissions`, `upsert_user_overrides`)
/// must be all-or-nothing for readers.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Every catalog entry, ordered by name.
    async fn list_permissions(&self) -> sqlx::Result<Vec<Permission>>;

    /// Catalog entries for the given names. Unknown names are absent from the result.
    async fn list_permissions_by_names(&self, names: &[String]) -> sqlx::Result<Vec<Permission>>;

    async fn get_permission(&self, id: PermissionId) -> sqlx::Result<Option<Permission>>;

    /// Permission names conferred by `role`.
    async fn get_role_permission_names(&self, role: &str) -> sqlx::Result<Vec<String>>;

    /// Replace the role baseline with exactly `permission_ids`, atomically.
    async fn replace_role_permissions(
        &self,
        role: &str,
        permission_ids: &[PermissionId],
    ) -> sqlx::Result<()>;

    /// The user's role, or `None` when the user has no record.
    async fn get_user_role(&self, user_id: UserId) -> sqlx::Result<Option<String>>;

    async fn get_user_overrides(&self, user_id: UserId) -> sqlx::Result<Vec<UserOverride>>;

    /// Insert or overwrite the override for `(user_id, permission_id)`.
    async fn upsert_user_override(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
        override_type: OverrideType,
    ) -> sqlx::Result<()>;

    /// Upsert several overrides for one user in a single transaction.
    async fn upsert_user_overrides(
        &self,
        user_id: UserId,
        entries: &[(PermissionId, OverrideType)],
    ) -> sqlx::Result<()>;

    /// Returns `true` if a row was deleted.
    async fn delete_user_override(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> sqlx::Result<bool>;

    /// Returns the number of rows deleted.
    async fn delete_all_user_overrides(&self, user_id: UserId) -> sqlx::Result<u64>;
}

/// `PostgreSQL`-backed permission store.
#[derive(Debug, Clone)]
pub struct PgPermissionStore {
    pool: PgPool,
}

impl PgPermissionStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn list_permissions(&self) -> sqlx::Result<Vec<Permission>> {
        queries::list_permissions(&self.pool).await
    }

    async fn list_permissions_by_names(&self, names: &[String]) -> sqlx::Result<Vec<Permission>> {
        queries::list_permissions_by_names(&self.pool, names).await
    }

    async fn get_permission(&self, id: PermissionId) -> sqlx::Result<Option<Permission>> {
        queries::get_permission(&self.pool, id).await
    }

    async fn get_role_permission_names(&self, role: &str) -> sqlx::Result<Vec<String>> {
        queries::get_role_permission_names(&self.pool, role).await
    }

    async fn replace_role_permissions(
        &self,
        role: &str,
        permission_ids: &[PermissionId],
    ) -> sqlx::Result<()> {
        queries::replace_role_permissions(&self.pool, role, permission_ids).await
    }

    async fn get_user_role(&self, user_id: UserId) -> sqlx::Result<Option<String>> {
        queries::get_user_role(&self.pool, user_id).await
    }

    async fn get_user_overrides(&self, user_id: UserId) -> sqlx::Result<Vec<UserOverride>> {
        queries::get_user_overrides(&self.pool, user_id).await
    }

    async fn upsert_user_override(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
        override_type: OverrideType,
    ) -> sqlx::Result<()> {
        queries::upsert_user_override(&self.pool, user_id, permission_id, override_type).await
    }

    async fn upsert_user_overrides(
        &self,
        user_id: UserId,
        entries: &[(PermissionId, OverrideType)],
    ) -> sqlx::Result<()> {
        queries::upsert_user_overrides(&self.pool, user_id, entries).await
    }

    async fn delete_user_override(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> sqlx::Result<bool> {
        queries::delete_user_override(&self.pool, user_id, permission_id).await
    }

    async fn delete_all_user_overrides(&self, user_id: UserId) -> sqlx::Result<u64> {
        queries::delete_all_user_overrides(&self.pool, user_id).await
    }
}
