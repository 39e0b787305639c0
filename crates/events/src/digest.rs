//! Digest scheduler.
//!
//! [`DigestScheduler::run_once`] looks at every eligible user of one
//! frequency, works out which of their tracked products moved past the
//! user's watermark, and queues either a populated digest or an "all quiet"
//! one for the user's next local send time. Both variants share one
//! idempotency key per period, so repeated runs never queue twice.

use chrono::Utc;
use relwatch_core::batch::BatchReport;
use relwatch_core::changes::{detect_updates, TrackedItem, MAX_UPDATES_PER_EMAIL};
use relwatch_core::email_types::{EmailPayload, DIGEST_KEY_SCOPE};
use relwatch_core::filler::pick_all_quiet_message;
use relwatch_core::queue::DEFAULT_MAX_ATTEMPTS;
use relwatch_core::schedule::{
    compute_idempotency_key, compute_scheduled_time, period_key, DigestFrequency,
    PeriodGranularity,
};
use relwatch_core::suppression::bounce_window;
use relwatch_core::types::{DbId, Timestamp};
use relwatch_db::models::email_queue::NewQueueEntry;
use relwatch_db::models::user_settings::UserNotificationSettings;
use relwatch_db::repositories::{
    EmailQueueRepo, SponsorRepo, TrackingRepo, UserSettingsRepo, VersionHistoryRepo,
};
use relwatch_db::DbPool;

use crate::error::EventsError;

/// Result of scheduling one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleResult {
    Queued { queue_id: DbId, update_count: usize },
    /// A row for this period already exists.
    AlreadyQueued,
    /// The user tracks nothing (they get the reminder instead).
    NothingTracked,
}

// ---------------------------------------------------------------------------
// DigestScheduler
// ---------------------------------------------------------------------------

pub struct DigestScheduler {
    pool: DbPool,
    max_updates_per_email: usize,
}

impl DigestScheduler {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            max_updates_per_email: MAX_UPDATES_PER_EMAIL,
        }
    }

    pub fn with_max_updates(mut self, max: usize) -> Self {
        self.max_updates_per_email = max;
        self
    }

    /// Queue one digest per eligible user of `frequency`.
    ///
    /// Failing to list recipients aborts the run; a failure for one user is
    /// recorded in the report and the run continues.
    pub async fn run_once(
        &self,
        frequency: DigestFrequency,
        now: Timestamp,
    ) -> Result<BatchReport, EventsError> {
        let recipients =
            UserSettingsRepo::list_digest_recipients(&self.pool, frequency, now - bounce_window())
                .await?;

        let mut report = BatchReport::new();
        for settings in &recipients {
            match self.schedule_user(settings, frequency, now).await {
                Ok(ScheduleResult::Queued {
                    queue_id,
                    update_count,
                }) => {
                    report.succeeded(
                        settings.user_id,
                        Some(format!("queue_id={queue_id} updates={update_count}")),
                    );
                }
                Ok(ScheduleResult::AlreadyQueued) => {
                    report.skipped(settings.user_id, "already queued for this period");
                }
                Ok(ScheduleResult::NothingTracked) => {
                    report.skipped(settings.user_id, "no tracked software");
                }
                Err(e) => {
                    tracing::error!(
                        user_id = settings.user_id,
                        error = %e,
                        "Failed to schedule digest for user"
                    );
                    report.failed(settings.user_id, e);
                }
            }
        }

        tracing::info!(
            frequency = frequency.as_str(),
            total = report.total,
            queued = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            "Digest scheduling finished"
        );
        Ok(report)
    }

    /// Build and enqueue the digest for a single user.
    pub async fn schedule_user(
        &self,
        settings: &UserNotificationSettings,
        frequency: DigestFrequency,
        now: Timestamp,
    ) -> Result<ScheduleResult, EventsError> {
        let tracked: Vec<TrackedItem> =
            TrackingRepo::list_tracked_for_user(&self.pool, settings.user_id)
                .await?
                .into_iter()
                .map(TrackedItem::from)
                .collect();
        if tracked.is_empty() {
            return Ok(ScheduleResult::NothingTracked);
        }

        let software_ids: Vec<DbId> = tracked.iter().map(|t| t.software_id).collect();
        let history = VersionHistoryRepo::list_detected_since(
            &self.pool,
            &software_ids,
            now - frequency.lookback(),
        )
        .await?;

        let detected = detect_updates(&tracked, &history, self.max_updates_per_email);
        let update_count = detected.updates.len();
        let sponsor = SponsorRepo::pick_active(&self.pool)
            .await?
            .map(|s| s.slot());

        let payload = if detected.is_empty() {
            EmailPayload::AllQuiet {
                frequency: frequency.as_str().to_string(),
                message: pick_all_quiet_message().to_string(),
                sponsor,
            }
        } else {
            EmailPayload::VersionDigest {
                frequency: frequency.as_str().to_string(),
                updates: detected.updates,
                omitted: detected.omitted,
                sponsor,
            }
        };

        let tz = settings.tz();
        let scheduled_for = compute_scheduled_time(now, tz, frequency);
        let period = period_key(scheduled_for, tz, PeriodGranularity::Day);
        let idempotency_key = compute_idempotency_key(settings.user_id, DIGEST_KEY_SCOPE, &period);

        let entry = NewQueueEntry {
            user_id: settings.user_id,
            email: settings.email.clone(),
            payload,
            scheduled_for,
            timezone: tz.name().to_string(),
            idempotency_key,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        };

        match EmailQueueRepo::enqueue(&self.pool, &entry).await? {
            Some(row) => {
                tracing::debug!(
                    user_id = settings.user_id,
                    queue_id = row.id,
                    email_type = %row.email_type,
                    scheduled_for = %row.scheduled_for,
                    "Digest queued"
                );
                Ok(ScheduleResult::Queued {
                    queue_id: row.id,
                    update_count,
                })
            }
            None => Ok(ScheduleResult::AlreadyQueued),
        }
    }

    /// Convenience wrapper using the current time.
    pub async fn run_now(&self, frequency: DigestFrequency) -> Result<BatchReport, EventsError> {
        self.run_once(frequency, Utc::now()).await
    }
}
