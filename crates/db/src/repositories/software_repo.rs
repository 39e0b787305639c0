//! Repository for the `software` table.

use relwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::software::{CreateSoftware, Software};

/// Column list for `software` queries.
const COLUMNS: &str = "id, name, manufacturer, category, website, version_check_url, \
    scraping_strategy, is_active, created_at, updated_at";

/// Read access to the software catalog. Inserts exist for seeding and tests.
pub struct SoftwareRepo;

impl SoftwareRepo {
    pub async fn create(pool: &PgPool, input: &CreateSoftware) -> Result<Software, sqlx::Error> {
        let query = format!(
            "INSERT INTO software \
                (name, manufacturer, category, website, version_check_url, scraping_strategy) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Software>(&query)
            .bind(&input.name)
            .bind(&input.manufacturer)
            .bind(&input.category)
            .bind(&input.website)
            .bind(&input.version_check_url)
            .bind(&input.scraping_strategy)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Software>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM software WHERE id = $1");
        sqlx::query_as::<_, Software>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All active entries in a stable order, so daily rotation windows line up.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Software>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM software WHERE is_active ORDER BY id");
        sqlx::query_as::<_, Software>(&query).fetch_all(pool).await
    }

    pub async fn set_active(pool: &PgPool, id: DbId, active: bool) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE software SET is_active = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(active)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
