//! Repository for the `user_notification_settings` table.
//!
//! Eligibility is decided here, in SQL, at generation time: a user receives
//! scheduled mail only while notifications are enabled and they have fewer
//! than [`HARD_BOUNCE_THRESHOLD`] hard bounces inside the bounce window.

use relwatch_core::schedule::DigestFrequency;
use relwatch_core::suppression::{BounceType, HARD_BOUNCE_THRESHOLD};
use relwatch_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::user_settings::{CreateUserSettings, UserNotificationSettings};

const COLUMNS: &str = "user_id, email, timezone, digest_frequency, notifications_enabled, \
    notifications_disabled_at, notifications_disabled_reason, created_at, updated_at";

/// Same column list qualified with the `s` alias.
const S_COLUMNS: &str = "s.user_id, s.email, s.timezone, s.digest_frequency, \
    s.notifications_enabled, s.notifications_disabled_at, s.notifications_disabled_reason, \
    s.created_at, s.updated_at";

/// Filter appended to recipient queries. `$1` is the bounce-window start.
const UNDER_BOUNCE_THRESHOLD: &str = "(SELECT COUNT(*) FROM email_bounces b \
      WHERE b.user_id = s.user_id AND b.bounce_type = $2 AND b.created_at >= $1) < $3";

pub struct UserSettingsRepo;

impl UserSettingsRepo {
    /// Insert or replace a user's settings. Re-enabling is not done here.
    pub async fn upsert(
        pool: &PgPool,
        input: &CreateUserSettings,
    ) -> Result<UserNotificationSettings, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_notification_settings (user_id, email, timezone, digest_frequency) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE SET \
                email = EXCLUDED.email, \
                timezone = EXCLUDED.timezone, \
                digest_frequency = EXCLUDED.digest_frequency, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserNotificationSettings>(&query)
            .bind(input.user_id)
            .bind(&input.email)
            .bind(&input.timezone)
            .bind(&input.digest_frequency)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_user_id(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<UserNotificationSettings>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_notification_settings WHERE user_id = $1");
        sqlx::query_as::<_, UserNotificationSettings>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive lookup by address.
    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<UserNotificationSettings>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_notification_settings WHERE LOWER(email) = LOWER($1)"
        );
        sqlx::query_as::<_, UserNotificationSettings>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Eligible users of `frequency` who track at least one product.
    pub async fn list_digest_recipients(
        pool: &PgPool,
        frequency: DigestFrequency,
        bounce_since: Timestamp,
    ) -> Result<Vec<UserNotificationSettings>, sqlx::Error> {
        let query = format!(
            "SELECT {S_COLUMNS} FROM user_notification_settings s \
             WHERE s.notifications_enabled \
               AND s.digest_frequency = $4 \
               AND EXISTS (SELECT 1 FROM user_software_tracking t WHERE t.user_id = s.user_id) \
               AND {UNDER_BOUNCE_THRESHOLD} \
             ORDER BY s.user_id"
        );
        sqlx::query_as::<_, UserNotificationSettings>(&query)
            .bind(bounce_since)
            .bind(BounceType::Hard.as_str())
            .bind(HARD_BOUNCE_THRESHOLD)
            .bind(frequency.as_str())
            .fetch_all(pool)
            .await
    }

    /// Eligible users who track nothing at all.
    pub async fn list_without_tracking(
        pool: &PgPool,
        bounce_since: Timestamp,
    ) -> Result<Vec<UserNotificationSettings>, sqlx::Error> {
        let query = format!(
            "SELECT {S_COLUMNS} FROM user_notification_settings s \
             WHERE s.notifications_enabled \
               AND NOT EXISTS (SELECT 1 FROM user_software_tracking t WHERE t.user_id = s.user_id) \
               AND {UNDER_BOUNCE_THRESHOLD} \
             ORDER BY s.user_id"
        );
        sqlx::query_as::<_, UserNotificationSettings>(&query)
            .bind(bounce_since)
            .bind(BounceType::Hard.as_str())
            .bind(HARD_BOUNCE_THRESHOLD)
            .fetch_all(pool)
            .await
    }

    /// Whether a user may still be sent scheduled mail right now.
    pub async fn is_eligible(
        pool: &PgPool,
        user_id: DbId,
        bounce_since: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "SELECT EXISTS ( \
                SELECT 1 FROM user_notification_settings s \
                WHERE s.user_id = $4 AND s.notifications_enabled AND {UNDER_BOUNCE_THRESHOLD} \
             )"
        );
        sqlx::query_scalar(&query)
            .bind(bounce_since)
            .bind(BounceType::Hard.as_str())
            .bind(HARD_BOUNCE_THRESHOLD)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Turn notifications off. Only rows still enabled are touched, so a
    /// second call is a no-op and returns `false`.
    pub async fn disable_notifications(
        pool: &PgPool,
        user_id: DbId,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_notification_settings \
             SET notifications_enabled = FALSE, \
                 notifications_disabled_at = NOW(), \
                 notifications_disabled_reason = $2, \
                 updated_at = NOW() \
             WHERE user_id = $1 AND notifications_enabled",
        )
        .bind(user_id)
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
