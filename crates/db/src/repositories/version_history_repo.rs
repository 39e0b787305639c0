//! Repository for the `software_version_history` table.
//!
//! Rows are append-only apart from the verification and override flags.
//! Duplicate `(software_id, version)` inserts are silently ignored.

use relwatch_core::types::{DbId, Timestamp};
use relwatch_core::version::current_version_from_history;
use sqlx::PgPool;

use crate::models::version_history::{NewVersion, VersionHistory};

/// Column list for `software_version_history` queries.
const COLUMNS: &str = "id, software_id, version, release_date, detected_at, notes, type, \
    newsletter_verified, is_current_override";

pub struct VersionHistoryRepo;

impl VersionHistoryRepo {
    /// Record a detected version unless it is already known.
    ///
    /// Returns `None` when `(software_id, version)` already exists.
    pub async fn insert_if_new(
        pool: &PgPool,
        input: &NewVersion,
    ) -> Result<Option<VersionHistory>, sqlx::Error> {
        let query = format!(
            "INSERT INTO software_version_history \
                (software_id, version, release_date, notes, type) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (software_id, version) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VersionHistory>(&query)
            .bind(input.software_id)
            .bind(&input.version)
            .bind(input.release_date)
            .bind(&input.notes)
            .bind(&input.version_type)
            .fetch_optional(pool)
            .await
    }

    /// Full history of one product, newest detection first.
    pub async fn list_for_software(
        pool: &PgPool,
        software_id: DbId,
    ) -> Result<Vec<VersionHistory>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM software_version_history \
             WHERE software_id = $1 \
             ORDER BY detected_at DESC, id DESC"
        );
        sqlx::query_as::<_, VersionHistory>(&query)
            .bind(software_id)
            .fetch_all(pool)
            .await
    }

    /// Rows of the given products detected at or after `since`, newest first.
    pub async fn list_detected_since(
        pool: &PgPool,
        software_ids: &[DbId],
        since: Timestamp,
    ) -> Result<Vec<VersionHistory>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM software_version_history \
             WHERE software_id = ANY($1) AND detected_at >= $2 \
             ORDER BY detected_at DESC, id DESC"
        );
        sqlx::query_as::<_, VersionHistory>(&query)
            .bind(software_ids)
            .bind(since)
            .fetch_all(pool)
            .await
    }

    /// Make `version_id` the single override for its product.
    ///
    /// Clears any other override of the same product in the same
    /// transaction. Returns `false` if the row does not belong to
    /// `software_id`.
    pub async fn set_current_override(
        pool: &PgPool,
        software_id: DbId,
        version_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE software_version_history SET is_current_override = FALSE \
             WHERE software_id = $1 AND is_current_override AND id <> $2",
        )
        .bind(software_id)
        .bind(version_id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "UPDATE software_version_history SET is_current_override = TRUE \
             WHERE id = $1 AND software_id = $2",
        )
        .bind(version_id)
        .bind(software_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Remove any override for a product. Returns the number of rows cleared.
    pub async fn clear_current_override(pool: &PgPool, software_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE software_version_history SET is_current_override = FALSE \
             WHERE software_id = $1 AND is_current_override",
        )
        .bind(software_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Flag rows confirmed by a second extraction pass.
    pub async fn mark_verified(
        pool: &PgPool,
        software_id: DbId,
        versions: &[String],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE software_version_history SET newsletter_verified = TRUE \
             WHERE software_id = $1 AND version = ANY($2) AND NOT newsletter_verified",
        )
        .bind(software_id)
        .bind(versions)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Load a product's history and pick its current version.
    pub async fn resolve_current(
        pool: &PgPool,
        software_id: DbId,
        only_verified: bool,
    ) -> Result<Option<VersionHistory>, sqlx::Error> {
        let history = Self::list_for_software(pool, software_id).await?;
        Ok(current_version_from_history(&history, only_verified).cloned())
    }
}
