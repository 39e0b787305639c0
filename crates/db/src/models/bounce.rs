//! Delivery failure records.

use relwatch_core::suppression::BounceType;
use relwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `email_bounces` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BounceRecord {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub email: String,
    pub bounce_type: String,
    pub reason: Option<String>,
    pub provider_message_id: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewBounce {
    pub user_id: Option<DbId>,
    pub email: String,
    pub bounce_type: BounceType,
    pub reason: Option<String>,
    pub provider_message_id: Option<String>,
    /// Defaults to now when `None`.
    pub occurred_at: Option<Timestamp>,
}
