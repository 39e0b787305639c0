//! Delivery-event ingestion and address suppression.
//!
//! Hard bounces are stored and counted over a rolling window; crossing the
//! threshold turns notifications off. A spam complaint turns them off
//! immediately. Soft bounces are only logged. Clicks on a sponsor link are
//! attributed to the placement.

use relwatch_core::error::CoreError;
use relwatch_core::suppression::{
    bounce_window, parse_delivery_event, should_suppress, suppression_reason, BounceType,
    DeliveryEvent, DeliveryEventKind,
};
use relwatch_core::types::{DbId, Timestamp};
use relwatch_core::webhook_signature::verify_webhook_signature;
use relwatch_db::models::bounce::NewBounce;
use relwatch_db::repositories::{BounceRepo, SponsorRepo, UserSettingsRepo};
use relwatch_db::DbPool;

use crate::error::EventsError;

/// What ingesting one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressionOutcome {
    /// Bounce stored, user still enabled.
    Recorded { bounce_type: BounceType },
    /// Notifications were turned off by this event.
    Suppressed { user_id: DbId, reason: &'static str },
    /// Nothing stored.
    Logged,
    ClickAttributed { sponsor_id: DbId },
    Ignored,
}

pub struct SuppressionEngine {
    pool: DbPool,
    webhook_secret: Option<String>,
}

impl SuppressionEngine {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            webhook_secret: None,
        }
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Check a webhook body against its signature header.
    pub fn verify(&self, body: &[u8], signature: &str) -> Result<(), EventsError> {
        let Some(secret) = self.webhook_secret.as_deref() else {
            return Err(CoreError::Configuration("webhook secret is not configured".into()).into());
        };
        if verify_webhook_signature(secret, body, signature) {
            Ok(())
        } else {
            Err(EventsError::InvalidSignature)
        }
    }

    /// Parse and handle a raw webhook body, verifying it first when a
    /// signature is supplied.
    pub async fn handle_payload(
        &self,
        body: &str,
        signature: Option<&str>,
        now: Timestamp,
    ) -> Result<SuppressionOutcome, EventsError> {
        if let Some(signature) = signature {
            self.verify(body.as_bytes(), signature)?;
        }
        let event = parse_delivery_event(body)?;
        self.handle_event(&event, now).await
    }

    pub async fn handle_event(
        &self,
        event: &DeliveryEvent,
        now: Timestamp,
    ) -> Result<SuppressionOutcome, EventsError> {
        match &event.kind {
            DeliveryEventKind::Bounced {
                bounce_type: BounceType::Soft,
                reason,
            } => {
                tracing::info!(
                    email = %event.email,
                    reason = reason.as_deref().unwrap_or(""),
                    "Soft bounce, not recorded"
                );
                Ok(SuppressionOutcome::Logged)
            }
            DeliveryEventKind::Bounced {
                bounce_type,
                reason,
            } => {
                self.record_bounce(event, *bounce_type, reason.clone(), now)
                    .await
            }
            DeliveryEventKind::Complained => {
                self.record_bounce(event, BounceType::Complaint, None, now)
                    .await
            }
            DeliveryEventKind::Clicked { link: Some(link) } => {
                match SponsorRepo::find_active_by_link(&self.pool, link).await? {
                    Some(sponsor) => {
                        SponsorRepo::record_click(&self.pool, sponsor.id).await?;
                        tracing::debug!(sponsor_id = sponsor.id, "Sponsor click attributed");
                        Ok(SuppressionOutcome::ClickAttributed {
                            sponsor_id: sponsor.id,
                        })
                    }
                    None => Ok(SuppressionOutcome::Ignored),
                }
            }
            other => {
                tracing::debug!(email = %event.email, kind = ?other, "Delivery event ignored");
                Ok(SuppressionOutcome::Ignored)
            }
        }
    }

    async fn record_bounce(
        &self,
        event: &DeliveryEvent,
        bounce_type: BounceType,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<SuppressionOutcome, EventsError> {
        let user = UserSettingsRepo::find_by_email(&self.pool, &event.email).await?;
        let user_id = user.as_ref().map(|u| u.user_id);

        BounceRepo::insert(
            &self.pool,
            &NewBounce {
                user_id,
                email: event.email.clone(),
                bounce_type,
                reason,
                provider_message_id: event.provider_message_id.clone(),
                occurred_at: event.occurred_at,
            },
        )
        .await?;

        let Some(user_id) = user_id else {
            tracing::warn!(email = %event.email, bounce_type = bounce_type.as_str(), "Bounce for unknown address");
            return Ok(SuppressionOutcome::Recorded { bounce_type });
        };

        let complained = bounce_type == BounceType::Complaint;
        let hard_bounces = if complained {
            0
        } else {
            BounceRepo::count_hard_since(&self.pool, user_id, now - bounce_window()).await?
        };

        if !should_suppress(hard_bounces, complained) {
            tracing::info!(user_id, hard_bounces, "Hard bounce recorded");
            return Ok(SuppressionOutcome::Recorded { bounce_type });
        }

        let Some(reason) = suppression_reason(hard_bounces, complained) else {
            return Ok(SuppressionOutcome::Recorded { bounce_type });
        };
        if UserSettingsRepo::disable_notifications(&self.pool, user_id, reason).await? {
            tracing::warn!(user_id, reason, hard_bounces, "Notifications disabled");
            Ok(SuppressionOutcome::Suppressed { user_id, reason })
        } else {
            Ok(SuppressionOutcome::Recorded { bounce_type })
        }
    }
}
