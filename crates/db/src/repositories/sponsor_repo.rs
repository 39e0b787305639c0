//! Repository for the `sponsor_placements` table.

use relwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::sponsor::SponsorPlacement;

const COLUMNS: &str = "id, name, link_url, is_active, impressions, clicks, created_at, updated_at";

pub struct SponsorRepo;

impl SponsorRepo {
    pub async fn create(
        pool: &PgPool,
        name: &str,
        link_url: &str,
    ) -> Result<SponsorPlacement, sqlx::Error> {
        let query = format!(
            "INSERT INTO sponsor_placements (name, link_url) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SponsorPlacement>(&query)
            .bind(name)
            .bind(link_url)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SponsorPlacement>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sponsor_placements WHERE id = $1");
        sqlx::query_as::<_, SponsorPlacement>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The active placement with the fewest impressions.
    pub async fn pick_active(pool: &PgPool) -> Result<Option<SponsorPlacement>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sponsor_placements WHERE is_active \
             ORDER BY impressions ASC, id ASC LIMIT 1"
        );
        sqlx::query_as::<_, SponsorPlacement>(&query)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_active_by_link(
        pool: &PgPool,
        link_url: &str,
    ) -> Result<Option<SponsorPlacement>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sponsor_placements WHERE is_active AND link_url = $1 \
             ORDER BY id LIMIT 1"
        );
        sqlx::query_as::<_, SponsorPlacement>(&query)
            .bind(link_url)
            .fetch_optional(pool)
            .await
    }

    pub async fn record_impression(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sponsor_placements SET impressions = impressions + 1, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn record_click(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sponsor_placements SET clicks = clicks + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
