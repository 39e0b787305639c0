//! Repository for the `user_software_tracking` table.

use std::cmp::Ordering;

use relwatch_core::types::DbId;
use relwatch_core::version::compare_versions;
use sqlx::PgPool;

use crate::models::tracking::{TrackedSoftware, Tracking};

const COLUMNS: &str = "id, user_id, software_id, last_notified_version, created_at, updated_at";

pub struct TrackingRepo;

impl TrackingRepo {
    /// Start tracking a product. Re-tracking keeps the existing watermark.
    pub async fn track(
        pool: &PgPool,
        user_id: DbId,
        software_id: DbId,
        last_notified_version: Option<&str>,
    ) -> Result<Tracking, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_software_tracking (user_id, software_id, last_notified_version) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, software_id) DO UPDATE SET updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tracking>(&query)
            .bind(user_id)
            .bind(software_id)
            .bind(last_notified_version)
            .fetch_one(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        user_id: DbId,
        software_id: DbId,
    ) -> Result<Option<Tracking>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_software_tracking WHERE user_id = $1 AND software_id = $2"
        );
        sqlx::query_as::<_, Tracking>(&query)
            .bind(user_id)
            .bind(software_id)
            .fetch_optional(pool)
            .await
    }

    /// Everything a user tracks on active products, with product names.
    pub async fn list_tracked_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<TrackedSoftware>, sqlx::Error> {
        sqlx::query_as::<_, TrackedSoftware>(
            "SELECT t.software_id, s.name AS software_name, t.last_notified_version \
             FROM user_software_tracking t \
             JOIN software s ON s.id = t.software_id \
             WHERE t.user_id = $1 AND s.is_active \
             ORDER BY s.name",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count_for_user(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_software_tracking WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Set the user's watermark for one product.
    pub async fn set_watermark(
        pool: &PgPool,
        user_id: DbId,
        software_id: DbId,
        version: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_software_tracking \
             SET last_notified_version = $3, updated_at = NOW() \
             WHERE user_id = $1 AND software_id = $2",
        )
        .bind(user_id)
        .bind(software_id)
        .bind(version)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Raise the user's watermarks to the delivered versions in one
    /// transaction. A watermark never moves backwards. Returns the number of
    /// watermarks changed.
    pub async fn advance_watermarks(
        pool: &PgPool,
        user_id: DbId,
        delivered: &[(DbId, &str)],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut advanced = 0;

        for &(software_id, version) in delivered {
            let current: Option<Option<String>> = sqlx::query_scalar(
                "SELECT last_notified_version FROM user_software_tracking \
                 WHERE user_id = $1 AND software_id = $2 \
                 FOR UPDATE",
            )
            .bind(user_id)
            .bind(software_id)
            .fetch_optional(&mut *tx)
            .await?;

            let newer = match current {
                None => continue,
                Some(None) => true,
                Some(Some(current)) => compare_versions(version, &current) == Ordering::Greater,
            };
            if !newer {
                continue;
            }

            sqlx::query(
                "UPDATE user_software_tracking \
                 SET last_notified_version = $3, updated_at = NOW() \
                 WHERE user_id = $1 AND software_id = $2",
            )
            .bind(user_id)
            .bind(software_id)
            .bind(version)
            .execute(&mut *tx)
            .await?;
            advanced += 1;
        }

        tx.commit().await?;
        Ok(advanced)
    }
}
