//! Database queries for the permission system.
//!
//! Provides async functions for managing:
//! - The permission catalog
//! - Role baselines (`role_permissions`)
//! - Per-user overrides (`user_permissions`)

use sqlx::{PgConnection, PgPool};

use super::models::{OverrideType, Permission, PermissionId, UserId, UserOverride};

// ============================================================================
// Catalog Queries
// ============================================================================

/// List the whole catalog, ordered by name.
pub async fn list_permissions(pool: &PgPool) -> sqlx::Result<Vec<Permission>> {
    sqlx::query_as::<_, Permission>(
        r"
        SELECT id, name
        FROM permissions
        ORDER BY name ASC
        ",
    )
    .fetch_all(pool)
    .await
}

/// Look up catalog entries by name. Names with no entry are simply missing.
pub async fn list_permissions_by_names(
    pool: &PgPool,
    names: &[String],
) -> sqlx::Result<Vec<Permission>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Permission>(
        r"
        SELECT id, name
        FROM permissions
        WHERE name = ANY($1)
        ORDER BY name ASC
        ",
    )
    .bind(names)
    .fetch_all(pool)
    .await
}

/// Get a catalog entry by ID.
pub async fn get_permission(pool: &PgPool, id: PermissionId) -> sqlx::Result<Option<Permission>> {
    sqlx::query_as::<_, Permission>("SELECT id, name FROM permissions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Add a catalog entry, returning the existing one if the name is taken.
pub async fn create_permission(pool: &PgPool, name: &str) -> sqlx::Result<Permission> {
    sqlx::query_as::<_, Permission>(
        r"
        INSERT INTO permissions (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id, name
        ",
    )
    .bind(name)
    .fetch_one(pool)
    .await
}

// ============================================================================
// Role Policy Queries
// ============================================================================

/// Get the permission names conferred by a role.
pub async fn get_role_permission_names(pool: &PgPool, role: &str) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(
        r"
        SELECT p.name
        FROM role_permissions rp
        JOIN permissions p ON p.id = rp.permission_id
        WHERE rp.role = $1
        ORDER BY p.name ASC
        ",
    )
    .bind(role)
    .fetch_all(pool)
    .await
}

/// Replace a role's baseline.
///
/// Delete and insert share one transaction, so readers never see the role
/// with an empty baseline mid-update.
pub async fn replace_role_permissions(
    pool: &PgPool,
    role: &str,
    permission_ids: &[PermissionId],
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM role_permissions WHERE role = $1")
        .bind(role)
        .execute(&mut *tx)
        .await?;

    if !permission_ids.is_empty() {
        sqlx::query(
            r"
            INSERT INTO role_permissions (role, permission_id)
            SELECT $1, UNNEST($2::int4[])
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(role)
        .bind(permission_ids)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

// ============================================================================
// User Queries
// ============================================================================

/// Get a user's role. `None` if the user does not exist.
pub async fn get_user_role(pool: &PgPool, user_id: UserId) -> sqlx::Result<Option<String>> {
    sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

// ============================================================================
// User Override Queries
// ============================================================================

/// Get all overrides for a user, joined with the permission name.
pub async fn get_user_overrides(pool: &PgPool, user_id: UserId) -> sqlx::Result<Vec<UserOverride>> {
    sqlx::query_as::<_, UserOverride>(
        r"
        SELECT p.name AS permission_name, up.type, up.updated_at
        FROM user_permissions up
        JOIN permissions p ON p.id = up.permission_id
        WHERE up.user_id = $1
        ORDER BY p.name ASC
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Upsert on the `(user_id, permission_id)` primary key, so a pair never has
/// more than one row.
const UPSERT_OVERRIDE: &str = r"
    INSERT INTO user_permissions (user_id, permission_id, type)
    VALUES ($1, $2, $3)
    ON CONFLICT (user_id, permission_id) DO UPDATE
    SET type = EXCLUDED.type,
        updated_at = NOW()
";

async fn upsert_override_on(
    conn: &mut PgConnection,
    user_id: UserId,
    permission_id: PermissionId,
    override_type: OverrideType,
) -> sqlx::Result<()> {
    sqlx::query(UPSERT_OVERRIDE)
        .bind(user_id)
        .bind(permission_id)
        .bind(override_type.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Create or overwrite a user's override for one permission.
pub async fn upsert_user_override(
    pool: &PgPool,
    user_id: UserId,
    permission_id: PermissionId,
    override_type: OverrideType,
) -> sqlx::Result<()> {
    let mut conn = pool.acquire().await?;
    upsert_override_on(&mut conn, user_id, permission_id, override_type).await
}

/// Create or overwrite several overrides for a user atomically.
pub async fn upsert_user_overrides(
    pool: &PgPool,
    user_id: UserId,
    entries: &[(PermissionId, OverrideType)],
) -> sqlx::Result<()> {
    if entries.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for &(permission_id, override_type) in entries {
        upsert_override_on(&mut tx, user_id, permission_id, override_type).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Delete a user's override for one permission.
///
/// Returns `true` if an override was deleted, `false` if none existed.
pub async fn delete_user_override(
    pool: &PgPool,
    user_id: UserId,
    permission_id: PermissionId,
) -> sqlx::Result<bool> {
    let result =
        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1 AND permission_id = $2")
            .bind(user_id)
            .bind(permission_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every override for a user. Returns the number of rows removed.
pub async fn delete_all_user_overrides(pool: &PgPool, user_id: UserId) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
