//! Organizations repository for database operations.
//!
//! Every query is scoped by `owner_user_id`, so a caller can never read or
//! modify another owner's rows. A row owned by someone else looks exactly
//! like a missing one.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Ownership is enforced in the WHERE clause of each statement

use crate::errors::OrgError;
use crate::models::Organization;
use crate::observability::metrics;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Columns returned by every query, in `map_row_to_organization` order.
const ORGANIZATION_COLUMNS: &str = "id, name, description, is_active, created_at, owner_user_id";

/// Organizations repository for database operations.
pub struct OrganizationsRepository;

impl OrganizationsRepository {
    /// Insert a new organization owned by `owner_user_id`.
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `owner_user_id` - Subject of the caller's token
    /// * `name` - Display name (already trimmed and validated)
    /// * `description` - Optional description
    /// * `is_active` - Active flag
    #[instrument(skip_all, name = "org.repo.create_organization")]
    pub async fn create(
        pool: &PgPool,
        owner_user_id: Uuid,
        name: &str,
        description: Option<&str>,
        is_active: bool,
    ) -> Result<Organization, OrgError> {
        let start = Instant::now();

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO organizations (id, name, description, is_active, owner_user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORGANIZATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4()) // $1
        .bind(name) // $2
        .bind(description) // $3
        .bind(is_active) // $4
        .bind(owner_user_id) // $5
        .fetch_one(pool)
        .await;

        let row = observe("create_organization", start, result)?;
        Ok(map_row_to_organization(&row))
    }

    /// List the organizations owned by `owner_user_id`, oldest first.
    #[instrument(skip_all, name = "org.repo.list_organizations")]
    pub async fn list_for_owner(
        pool: &PgPool,
        owner_user_id: Uuid,
    ) -> Result<Vec<Organization>, OrgError> {
        let start = Instant::now();

        let result = sqlx::query(&format!(
            r#"
            SELECT {ORGANIZATION_COLUMNS}
            FROM organizations
            WHERE owner_user_id = $1
            ORDER BY created_at, id
            "#
        ))
        .bind(owner_user_id)
        .fetch_all(pool)
        .await;

        let rows = observe("list_organizations", start, result)?;
        Ok(rows.iter().map(map_row_to_organization).collect())
    }

    /// Fetch one organization if it exists and is owned by `owner_user_id`.
    #[instrument(skip_all, name = "org.repo.get_organization")]
    pub async fn get_for_owner(
        pool: &PgPool,
        id: Uuid,
        owner_user_id: Uuid,
    ) -> Result<Option<Organization>, OrgError> {
        let start = Instant::now();

        let result = sqlx::query(&format!(
            r#"
            SELECT {ORGANIZATION_COLUMNS}
            FROM organizations
            WHERE id = $1 AND owner_user_id = $2
            "#
        ))
        .bind(id)
        .bind(owner_user_id)
        .fetch_optional(pool)
        .await;

        let row = observe("get_organization", start, result)?;
        Ok(row.as_ref().map(map_row_to_organization))
    }

    /// Apply a partial update to an owned organization.
    ///
    /// `None` fields keep their stored value. Returns the updated row, or
    /// `None` if no owned row matched.
    #[instrument(skip_all, name = "org.repo.update_organization")]
    pub async fn update_for_owner(
        pool: &PgPool,
        id: Uuid,
        owner_user_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Option<Organization>, OrgError> {
        let start = Instant::now();

        let result = sqlx::query(&format!(
            r#"
            UPDATE organizations
            SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                is_active = COALESCE($5, is_active)
            WHERE id = $1 AND owner_user_id = $2
            RETURNING {ORGANIZATION_COLUMNS}
            "#
        ))
        .bind(id) // $1
        .bind(owner_user_id) // $2
        .bind(name) // $3
        .bind(description) // $4
        .bind(is_active) // $5
        .fetch_optional(pool)
        .await;

        let row = observe("update_organization", start, result)?;
        Ok(row.as_ref().map(map_row_to_organization))
    }

    /// Delete an owned organization.
    ///
    /// Returns `true` if a row was deleted.
    #[instrument(skip_all, name = "org.repo.delete_organization")]
    pub async fn delete_for_owner(
        pool: &PgPool,
        id: Uuid,
        owner_user_id: Uuid,
    ) -> Result<bool, OrgError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            DELETE FROM organizations
            WHERE id = $1 AND owner_user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_user_id)
        .execute(pool)
        .await;

        let done = observe("delete_organization", start, result)?;
        Ok(done.rows_affected() > 0)
    }

    /// Round-trip `SELECT 1` to confirm the database answers queries.
    #[instrument(skip_all, name = "org.repo.ping")]
    pub async fn ping(pool: &PgPool) -> Result<i32, OrgError> {
        let start = Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;

        observe("ping", start, result)
    }
}

/// Record query metrics and convert the error.
fn observe<T>(
    operation: &'static str,
    start: Instant,
    result: Result<T, sqlx::Error>,
) -> Result<T, OrgError> {
    let duration = start.elapsed();
    match result {
        Ok(value) => {
            metrics::record_db_query(operation, "success", duration);
            Ok(value)
        }
        Err(e) => {
            metrics::record_db_query(operation, "error", duration);
            Err(OrgError::Database(e.to_string()))
        }
    }
}

/// Map a database row to an [`Organization`].
fn map_row_to_organization(row: &sqlx::postgres::PgRow) -> Organization {
    Organization {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        owner_user_id: row.get("owner_user_id"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_create_and_get(pool: PgPool) -> Result<(), anyhow::Error> {
        let owner = Uuid::new_v4();

        let created =
            OrganizationsRepository::create(&pool, owner, "Acme", Some("Widgets"), true).await?;
        assert_eq!(created.name, "Acme");
        assert_eq!(created.description.as_deref(), Some("Widgets"));
        assert!(created.is_active);
        assert_eq!(created.owner_user_id, owner);

        let fetched = OrganizationsRepository::get_for_owner(&pool, created.id, owner).await?;
        assert_eq!(fetched, Some(created));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_other_owner_sees_nothing(pool: PgPool) -> Result<(), anyhow::Error> {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let org = OrganizationsRepository::create(&pool, owner, "Acme", None, true).await?;

        assert!(OrganizationsRepository::get_for_owner(&pool, org.id, stranger)
            .await?
            .is_none());
        assert!(OrganizationsRepository::list_for_owner(&pool, stranger)
            .await?
            .is_empty());
        assert!(OrganizationsRepository::update_for_owner(
            &pool,
            org.id,
            stranger,
            Some("Hijacked"),
            None,
            None
        )
        .await?
        .is_none());
        assert!(!OrganizationsRepository::delete_for_owner(&pool, org.id, stranger).await?);

        let still_there = OrganizationsRepository::get_for_owner(&pool, org.id, owner)
            .await?
            .unwrap();
        assert_eq!(still_there.name, "Acme");
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_list_is_scoped_and_ordered(pool: PgPool) -> Result<(), anyhow::Error> {
        let owner = Uuid::new_v4();
        let first = OrganizationsRepository::create(&pool, owner, "First", None, true).await?;
        let second = OrganizationsRepository::create(&pool, owner, "Second", None, false).await?;
        OrganizationsRepository::create(&pool, Uuid::new_v4(), "Other", None, true).await?;

        let listed = OrganizationsRepository::list_for_owner(&pool, owner).await?;
        let ids: Vec<Uuid> = listed.iter().map(|o| o.id).collect();
        assert_eq!(listed.len(), 2);
        assert!(ids.contains(&first.id));
        assert!(ids.contains(&second.id));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_partial_update_keeps_unset_fields(pool: PgPool) -> Result<(), anyhow::Error> {
        let owner = Uuid::new_v4();
        let org =
            OrganizationsRepository::create(&pool, owner, "Acme", Some("Widgets"), true).await?;

        let updated =
            OrganizationsRepository::update_for_owner(&pool, org.id, owner, None, None, Some(false))
                .await?
                .unwrap();
        assert_eq!(updated.name, "Acme");
        assert_eq!(updated.description.as_deref(), Some("Widgets"));
        assert!(!updated.is_active);
        assert_eq!(updated.created_at, org.created_at);

        let renamed = OrganizationsRepository::update_for_owner(
            &pool,
            org.id,
            owner,
            Some("Acme Holdings"),
            None,
            None,
        )
        .await?
        .unwrap();
        assert_eq!(renamed.name, "Acme Holdings");
        assert!(!renamed.is_active);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_delete(pool: PgPool) -> Result<(), anyhow::Error> {
        let owner = Uuid::new_v4();
        let org = OrganizationsRepository::create(&pool, owner, "Acme", None, true).await?;

        assert!(OrganizationsRepository::delete_for_owner(&pool, org.id, owner).await?);
        assert!(!OrganizationsRepository::delete_for_owner(&pool, org.id, owner).await?);
        assert!(OrganizationsRepository::get_for_owner(&pool, org.id, owner)
            .await?
            .is_none());
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_ping(pool: PgPool) -> Result<(), anyhow::Error> {
        assert_eq!(OrganizationsRepository::ping(&pool).await?, 1);
        Ok(())
    }
}
