//! Per-user notification settings.

use chrono_tz::Tz;
use relwatch_core::schedule::{parse_timezone, DigestFrequency};
use relwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `user_notification_settings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserNotificationSettings {
    pub user_id: DbId,
    pub email: String,
    pub timezone: String,
    pub digest_frequency: String,
    pub notifications_enabled: bool,
    pub notifications_disabled_at: Option<Timestamp>,
    pub notifications_disabled_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserNotificationSettings {
    /// The user's timezone, falling back to UTC for unknown names.
    pub fn tz(&self) -> Tz {
        parse_timezone(&self.timezone).unwrap_or(Tz::UTC)
    }

    pub fn frequency(&self) -> Option<DigestFrequency> {
        DigestFrequency::parse(&self.digest_frequency)
    }
}

/// DTO for creating or replacing a user's settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserSettings {
    pub user_id: DbId,
    pub email: String,
    pub timezone: String,
    pub digest_frequency: String,
}
