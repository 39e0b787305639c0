//! Repository for the append-only `email_bounces` table.

use relwatch_core::suppression::BounceType;
use relwatch_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::bounce::{BounceRecord, NewBounce};

const COLUMNS: &str = "id, user_id, email, bounce_type, reason, provider_message_id, created_at";

pub struct BounceRepo;

impl BounceRepo {
    pub async fn insert(pool: &PgPool, input: &NewBounce) -> Result<BounceRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO email_bounces \
                (user_id, email, bounce_type, reason, provider_message_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW())) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BounceRecord>(&query)
            .bind(input.user_id)
            .bind(&input.email)
            .bind(input.bounce_type.as_str())
            .bind(&input.reason)
            .bind(&input.provider_message_id)
            .bind(input.occurred_at)
            .fetch_one(pool)
            .await
    }

    /// Hard bounces recorded for a user at or after `since`.
    pub async fn count_hard_since(
        pool: &PgPool,
        user_id: DbId,
        since: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM email_bounces \
             WHERE user_id = $1 AND bounce_type = $2 AND created_at >= $3",
        )
        .bind(user_id)
        .bind(BounceType::Hard.as_str())
        .bind(since)
        .fetch_one(pool)
        .await
    }

    pub async fn list_for_email(pool: &PgPool, email: &str) -> Result<Vec<BounceRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM email_bounces WHERE LOWER(email) = LOWER($1) \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, BounceRecord>(&query)
            .bind(email)
            .fetch_all(pool)
            .await
    }
}
