//! Email queue entity.

use relwatch_core::email_types::EmailPayload;
use relwatch_core::queue::QueueStatus;
use relwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `email_queue` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueEntry {
    pub id: DbId,
    pub user_id: DbId,
    pub email: String,
    pub email_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub scheduled_for: Timestamp,
    pub timezone: String,
    pub idempotency_key: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<Timestamp>,
    /// When a sender last took the row. Stale claims are taken again.
    pub claimed_at: Option<Timestamp>,
    pub sent_at: Option<Timestamp>,
    pub provider_message_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl QueueEntry {
    pub fn status(&self) -> Option<QueueStatus> {
        QueueStatus::parse(&self.status)
    }

    pub fn decode_payload(&self) -> Result<EmailPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// DTO for enqueueing an email.
#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub user_id: DbId,
    pub email: String,
    pub payload: EmailPayload,
    pub scheduled_for: Timestamp,
    pub timezone: String,
    pub idempotency_key: String,
    pub max_attempts: i32,
}
