//! Queue sender.
//!
//! [`QueueSender::run_once`] claims due rows, re-checks that the recipient
//! may still be mailed, renders the payload, and hands it to the configured
//! [`EmailSender`] at a bounded rate. Successful digests advance the user's
//! watermarks; failures are retried with exponential backoff until the row
//! runs out of attempts.

use std::sync::Arc;
use std::time::Duration;

use relwatch_core::batch::BatchReport;
use relwatch_core::email_types::EmailPayload;
use relwatch_core::queue::{next_status_after_failure, retry_delay, QueueStatus};
use relwatch_core::suppression::bounce_window;
use relwatch_core::types::{DbId, Timestamp};
use relwatch_db::models::email_queue::QueueEntry;
use relwatch_db::repositories::{EmailQueueRepo, SponsorRepo, TrackingRepo, UserSettingsRepo};
use relwatch_db::DbPool;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::delivery::{EmailSender, OutgoingEmail};
use crate::error::EventsError;
use crate::render::render;

/// Rows claimed per run.
pub const DEFAULT_BATCH_SIZE: i64 = 100;

/// Provider rate limit.
pub const DEFAULT_EMAILS_PER_SECOND: u32 = 2;

/// Reason stored on rows cancelled because the user became ineligible.
pub const CANCEL_REASON_SUPPRESSED: &str = "recipient suppressed";

/// What happened to one claimed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { message_id: Option<String> },
    /// The user was disabled or bounced after the row was queued.
    Suppressed,
    Retrying { attempt: i32, next_attempt_at: Timestamp },
    Failed { error: String },
}

// ---------------------------------------------------------------------------
// QueueSender
// ---------------------------------------------------------------------------

pub struct QueueSender {
    pool: DbPool,
    sender: Arc<dyn EmailSender>,
    batch_size: i64,
    emails_per_second: u32,
}

impl QueueSender {
    pub fn new(pool: DbPool, sender: Arc<dyn EmailSender>) -> Self {
        Self {
            pool,
            sender,
            batch_size: DEFAULT_BATCH_SIZE,
            emails_per_second: DEFAULT_EMAILS_PER_SECOND,
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_rate(mut self, emails_per_second: u32) -> Self {
        self.emails_per_second = emails_per_second.max(1);
        self
    }

    /// Claim and deliver every row due at `now`.
    pub async fn run_once(&self, now: Timestamp) -> Result<BatchReport, EventsError> {
        let claimed = EmailQueueRepo::claim_due(&self.pool, now, self.batch_size).await?;
        let mut report = BatchReport::new();
        if claimed.is_empty() {
            tracing::debug!("No queued emails due");
            return Ok(report);
        }

        let mut pacer = self.pacer();
        for entry in &claimed {
            match self.process(entry, now, &mut pacer).await {
                Ok(SendOutcome::Sent { message_id }) => {
                    report.succeeded(entry.id, message_id);
                }
                Ok(SendOutcome::Suppressed) => {
                    report.skipped(entry.id, CANCEL_REASON_SUPPRESSED);
                }
                Ok(SendOutcome::Retrying {
                    attempt,
                    next_attempt_at,
                }) => {
                    report.failed(
                        entry.id,
                        format!("attempt {attempt} failed, retry at {next_attempt_at}"),
                    );
                }
                Ok(SendOutcome::Failed { error }) => report.failed(entry.id, error),
                Err(e) => {
                    tracing::error!(queue_id = entry.id, error = %e, "Failed to process queued email");
                    report.failed(entry.id, e);
                }
            }
        }

        tracing::info!(
            claimed = report.total,
            sent = report.succeeded,
            suppressed = report.skipped,
            failed = report.failed,
            "Queue send finished"
        );
        Ok(report)
    }

    fn pacer(&self) -> Interval {
        let period = Duration::from_secs(1) / self.emails_per_second;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    async fn process(
        &self,
        entry: &QueueEntry,
        now: Timestamp,
        pacer: &mut Interval,
    ) -> Result<SendOutcome, EventsError> {
        let eligible =
            UserSettingsRepo::is_eligible(&self.pool, entry.user_id, now - bounce_window()).await?;
        if !eligible {
            EmailQueueRepo::cancel(&self.pool, entry.id, CANCEL_REASON_SUPPRESSED).await?;
            tracing::info!(queue_id = entry.id, user_id = entry.user_id, "Queued email cancelled, recipient suppressed");
            return Ok(SendOutcome::Suppressed);
        }

        let payload = match entry.decode_payload() {
            Ok(payload) => payload,
            Err(e) => {
                let error = format!("undecodable payload: {e}");
                EmailQueueRepo::record_failure(
                    &self.pool,
                    entry.id,
                    entry.attempts + 1,
                    QueueStatus::Failed,
                    &error,
                    None,
                )
                .await?;
                tracing::error!(queue_id = entry.id, error = %e, "Queued email has an invalid payload");
                return Ok(SendOutcome::Failed { error });
            }
        };

        let rendered = render(&payload);
        let email = OutgoingEmail {
            to: entry.email.clone(),
            subject: rendered.subject,
            body: rendered.body,
        };

        pacer.tick().await;
        match self.sender.send(&email).await {
            Ok(receipt) => {
                EmailQueueRepo::mark_sent(&self.pool, entry.id, receipt.message_id.as_deref())
                    .await?;
                // Delivered: bookkeeping errors are logged, the row stays sent.
                if let Err(e) = self.after_delivery(entry, &payload).await {
                    tracing::error!(
                        queue_id = entry.id,
                        user_id = entry.user_id,
                        error = %e,
                        "Email sent but post-delivery bookkeeping failed"
                    );
                }
                tracing::info!(
                    queue_id = entry.id,
                    user_id = entry.user_id,
                    email_type = %entry.email_type,
                    "Email sent"
                );
                Ok(SendOutcome::Sent {
                    message_id: receipt.message_id,
                })
            }
            Err(e) => self.handle_failure(entry, now, &e.to_string()).await,
        }
    }

    /// Advance watermarks for the delivered updates and count the sponsor
    /// impression.
    async fn after_delivery(
        &self,
        entry: &QueueEntry,
        payload: &EmailPayload,
    ) -> Result<(), EventsError> {
        let delivered: Vec<(DbId, &str)> = payload
            .updates()
            .iter()
            .map(|u| (u.software_id, u.new_version.as_str()))
            .collect();
        if !delivered.is_empty() {
            TrackingRepo::advance_watermarks(&self.pool, entry.user_id, &delivered).await?;
        }

        let sponsor = match payload {
            EmailPayload::VersionDigest { sponsor, .. } | EmailPayload::AllQuiet { sponsor, .. } => {
                sponsor.as_ref()
            }
            EmailPayload::NoTrackingReminder => None,
        };
        if let Some(slot) = sponsor {
            SponsorRepo::record_impression(&self.pool, slot.sponsor_id).await?;
        }
        Ok(())
    }

    async fn handle_failure(
        &self,
        entry: &QueueEntry,
        now: Timestamp,
        error: &str,
    ) -> Result<SendOutcome, EventsError> {
        let attempt = entry.attempts + 1;
        let status = next_status_after_failure(attempt, entry.max_attempts);
        let next_attempt_at = (status == QueueStatus::Pending).then(|| now + retry_delay(attempt));

        EmailQueueRepo::record_failure(&self.pool, entry.id, attempt, status, error, next_attempt_at)
            .await?;

        match next_attempt_at {
            Some(next_attempt_at) => {
                tracing::warn!(
                    queue_id = entry.id,
                    attempt,
                    next_attempt_at = %next_attempt_at,
                    error,
                    "Email send failed, will retry"
                );
                Ok(SendOutcome::Retrying {
                    attempt,
                    next_attempt_at,
                })
            }
            None => {
                tracing::error!(queue_id = entry.id, attempt, error, "Email send failed permanently");
                Ok(SendOutcome::Failed {
                    error: error.to_string(),
                })
            }
        }
    }
}
