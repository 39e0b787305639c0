//! Repository for the `email_queue` table.
//!
//! Inserts are idempotent on `idempotency_key`; claiming uses
//! `FOR UPDATE SKIP LOCKED` so concurrent senders never take the same row.
//! A claim is a lease: rows left in `processing` past [`claim_lease`] are
//! claimed again, and the abandoned attempt counts against `max_attempts`.

use relwatch_core::queue::{claim_lease, QueueStatus};
use relwatch_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::email_queue::{NewQueueEntry, QueueEntry};

const COLUMNS: &str = "id, user_id, email, email_type, payload, status, scheduled_for, timezone, \
    idempotency_key, attempts, max_attempts, last_error, next_attempt_at, claimed_at, sent_at, \
    provider_message_id, created_at, updated_at";

/// `last_error` recorded when an abandoned claim is taken back.
pub const CLAIM_EXPIRED_ERROR: &str = "claim expired before the send finished";

pub struct EmailQueueRepo;

impl EmailQueueRepo {
    /// Insert a pending row. Returns `None` if the key is already queued.
    pub async fn enqueue(
        pool: &PgPool,
        input: &NewQueueEntry,
    ) -> Result<Option<QueueEntry>, sqlx::Error> {
        let query = format!(
            "INSERT INTO email_queue \
                (user_id, email, email_type, payload, status, scheduled_for, timezone, \
                 idempotency_key, max_attempts) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (idempotency_key) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueEntry>(&query)
            .bind(input.user_id)
            .bind(&input.email)
            .bind(input.payload.email_type())
            .bind(Json(&input.payload))
            .bind(QueueStatus::Pending.as_str())
            .bind(input.scheduled_for)
            .bind(&input.timezone)
            .bind(&input.idempotency_key)
            .bind(input.max_attempts)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<QueueEntry>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM email_queue WHERE id = $1");
        sqlx::query_as::<_, QueueEntry>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_key(
        pool: &PgPool,
        idempotency_key: &str,
    ) -> Result<Option<QueueEntry>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM email_queue WHERE idempotency_key = $1");
        sqlx::query_as::<_, QueueEntry>(&query)
            .bind(idempotency_key)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<QueueEntry>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM email_queue WHERE user_id = $1 ORDER BY scheduled_for, id");
        sqlx::query_as::<_, QueueEntry>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Atomically move up to `limit` due rows to `processing`.
    ///
    /// Due rows are pending rows whose schedule and retry time have passed,
    /// plus `processing` rows whose claim is older than the lease. A stale
    /// row that has used its last attempt is marked failed instead.
    pub async fn claim_due(
        pool: &PgPool,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<QueueEntry>, sqlx::Error> {
        let stale_before = now - claim_lease();
        let mut tx = pool.begin().await?;

        let expired = sqlx::query(
            "UPDATE email_queue \
             SET status = $1, attempts = attempts + 1, last_error = $2, updated_at = NOW() \
             WHERE status = $3 \
               AND COALESCE(claimed_at, updated_at) <= $4 \
               AND attempts + 1 >= max_attempts",
        )
        .bind(QueueStatus::Failed.as_str())
        .bind(CLAIM_EXPIRED_ERROR)
        .bind(QueueStatus::Processing.as_str())
        .bind(stale_before)
        .execute(&mut *tx)
        .await?;
        if expired.rows_affected() > 0 {
            tracing::warn!(rows = expired.rows_affected(), "Abandoned queue rows out of attempts, marked failed");
        }

        let query = format!(
            "UPDATE email_queue \
             SET status = $1, claimed_at = $3, updated_at = NOW(), \
                 attempts = CASE WHEN status = $1 THEN attempts + 1 ELSE attempts END, \
                 last_error = CASE WHEN status = $1 THEN $6 ELSE last_error END \
             WHERE id IN ( \
                 SELECT id FROM email_queue \
                 WHERE (status = $2 \
                        AND scheduled_for <= $3 \
                        AND (next_attempt_at IS NULL OR next_attempt_at <= $3)) \
                    OR (status = $1 AND COALESCE(claimed_at, updated_at) <= $5) \
                 ORDER BY scheduled_for, id \
                 LIMIT $4 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let claimed = sqlx::query_as::<_, QueueEntry>(&query)
            .bind(QueueStatus::Processing.as_str())
            .bind(QueueStatus::Pending.as_str())
            .bind(now)
            .bind(limit)
            .bind(stale_before)
            .bind(CLAIM_EXPIRED_ERROR)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(claimed)
    }

    pub async fn mark_sent(
        pool: &PgPool,
        id: DbId,
        provider_message_id: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE email_queue \
             SET status = $2, sent_at = NOW(), provider_message_id = $3, \
                 attempts = attempts + 1, last_error = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(QueueStatus::Sent.as_str())
        .bind(provider_message_id)
        .bind(QueueStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store a failed attempt. `status` is either `Pending` (with a retry
    /// time) or `Failed`.
    pub async fn record_failure(
        pool: &PgPool,
        id: DbId,
        attempts: i32,
        status: QueueStatus,
        error: &str,
        next_attempt_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE email_queue \
             SET status = $2, attempts = $3, last_error = $4, next_attempt_at = $5, \
                 updated_at = NOW() \
             WHERE id = $1 AND status = $6",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(attempts)
        .bind(error)
        .bind(next_attempt_at)
        .bind(QueueStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a row that has not been sent yet.
    pub async fn cancel(pool: &PgPool, id: DbId, reason: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE email_queue \
             SET status = $2, last_error = $3, updated_at = NOW() \
             WHERE id = $1 AND status IN ($4, $5)",
        )
        .bind(id)
        .bind(QueueStatus::Cancelled.as_str())
        .bind(reason)
        .bind(QueueStatus::Pending.as_str())
        .bind(QueueStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
