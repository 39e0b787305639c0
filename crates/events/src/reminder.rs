//! Monthly reminder for users who track nothing.

use chrono::Utc;
use relwatch_core::batch::BatchReport;
use relwatch_core::email_types::{EmailPayload, EMAIL_TYPE_NO_TRACKING_REMINDER};
use relwatch_core::queue::DEFAULT_MAX_ATTEMPTS;
use relwatch_core::schedule::{
    compute_idempotency_key, compute_reminder_time, period_key, PeriodGranularity,
};
use relwatch_core::suppression::bounce_window;
use relwatch_core::types::Timestamp;
use relwatch_db::models::email_queue::NewQueueEntry;
use relwatch_db::repositories::{EmailQueueRepo, UserSettingsRepo};
use relwatch_db::DbPool;

use crate::error::EventsError;

pub struct NoTrackingReminderScheduler {
    pool: DbPool,
}

impl NoTrackingReminderScheduler {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Queue a reminder for the 15th at 08:00 local for every eligible user
    /// with no tracked software. One row per user per month.
    pub async fn run_once(&self, now: Timestamp) -> Result<BatchReport, EventsError> {
        let users = UserSettingsRepo::list_without_tracking(&self.pool, now - bounce_window()).await?;
        let mut report = BatchReport::new();

        for settings in &users {
            let tz = settings.tz();
            let scheduled_for = compute_reminder_time(now, tz);
            let period = period_key(scheduled_for, tz, PeriodGranularity::Month);
            let entry = NewQueueEntry {
                user_id: settings.user_id,
                email: settings.email.clone(),
                payload: EmailPayload::NoTrackingReminder,
                scheduled_for,
                timezone: tz.name().to_string(),
                idempotency_key: compute_idempotency_key(
                    settings.user_id,
                    EMAIL_TYPE_NO_TRACKING_REMINDER,
                    &period,
                ),
                max_attempts: DEFAULT_MAX_ATTEMPTS,
            };

            match EmailQueueRepo::enqueue(&self.pool, &entry).await {
                Ok(Some(row)) => report.succeeded(settings.user_id, Some(format!("queue_id={}", row.id))),
                Ok(None) => report.skipped(settings.user_id, "already queued for this month"),
                Err(e) => {
                    tracing::error!(user_id = settings.user_id, error = %e, "Failed to queue reminder");
                    report.failed(settings.user_id, e);
                }
            }
        }

        tracing::info!(
            total = report.total,
            queued = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            "Reminder scheduling finished"
        );
        Ok(report)
    }

    pub async fn run_now(&self) -> Result<BatchReport, EventsError> {
        self.run_once(Utc::now()).await
    }
}
