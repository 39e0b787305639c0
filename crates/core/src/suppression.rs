//! Delivery-event taxonomy and suppression policy.
//!
//! The email provider posts webhook events (`email.delivered`,
//! `email.bounced`, `email.complained`, ...). [`parse_delivery_event`] turns
//! one into a [`DeliveryEvent`]; [`should_suppress`] decides whether an
//! address has crossed the line and must stop receiving mail.

use chrono::Duration;
use serde::Deserialize;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Hard bounces within [`BOUNCE_WINDOW_DAYS`] that disable notifications.
pub const HARD_BOUNCE_THRESHOLD: i64 = 3;

/// Rolling window over which hard bounces are counted.
pub const BOUNCE_WINDOW_DAYS: i64 = 30;

/// `notifications_disabled_reason` written after a spam complaint.
pub const REASON_COMPLAINT: &str = "spam_complaint";

/// `notifications_disabled_reason` written after repeated hard bounces.
pub const REASON_HARD_BOUNCES: &str = "hard_bounce_threshold";

pub fn bounce_window() -> Duration {
    Duration::days(BOUNCE_WINDOW_DAYS)
}

// ---------------------------------------------------------------------------
// Bounce types
// ---------------------------------------------------------------------------

/// Value of `email_bounces.bounce_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BounceType {
    Hard,
    Soft,
    Complaint,
}

impl BounceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BounceType::Hard => "hard",
            BounceType::Soft => "soft",
            BounceType::Complaint => "complaint",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hard" => Some(BounceType::Hard),
            "soft" => Some(BounceType::Soft),
            "complaint" => Some(BounceType::Complaint),
            _ => None,
        }
    }

    /// Classify a provider bounce type. `Permanent` and `hard` are hard
    /// bounces, anything else is soft.
    pub fn from_provider(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("permanent") | Some("hard") => BounceType::Hard,
            _ => BounceType::Soft,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What happened to a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEventKind {
    Delivered,
    Opened,
    Clicked { link: Option<String> },
    Bounced { bounce_type: BounceType, reason: Option<String> },
    Complained,
    Other(String),
}

/// One provider callback, reduced to what suppression needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEvent {
    pub kind: DeliveryEventKind,
    /// First recipient, lowercased.
    pub email: String,
    pub provider_message_id: Option<String>,
    pub occurred_at: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    created_at: Option<Timestamp>,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    #[serde(default)]
    email_id: Option<String>,
    #[serde(default)]
    to: Option<Recipients>,
    #[serde(default)]
    bounce: Option<WebhookBounce>,
    #[serde(default)]
    click: Option<WebhookClick>,
}

/// Providers send either a single address or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    fn first(&self) -> Option<&str> {
        match self {
            Recipients::One(s) => Some(s),
            Recipients::Many(v) => v.first().map(String::as_str),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookBounce {
    #[serde(default, rename = "type")]
    bounce_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookClick {
    #[serde(default)]
    link: Option<String>,
}

/// Parse a provider webhook body.
pub fn parse_delivery_event(body: &str) -> Result<DeliveryEvent, CoreError> {
    let payload: WebhookPayload = serde_json::from_str(body)
        .map_err(|e| CoreError::Validation(format!("invalid webhook payload: {e}")))?;

    let email = payload
        .data
        .to
        .as_ref()
        .and_then(Recipients::first)
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::Validation("webhook payload has no recipient".into()))?;

    let kind = match payload.event_type.as_str() {
        "email.delivered" => DeliveryEventKind::Delivered,
        "email.opened" => DeliveryEventKind::Opened,
        "email.clicked" => DeliveryEventKind::Clicked {
            link: payload.data.click.and_then(|c| c.link),
        },
        "email.bounced" => {
            let bounce = payload.data.bounce;
            DeliveryEventKind::Bounced {
                bounce_type: BounceType::from_provider(
                    bounce.as_ref().and_then(|b| b.bounce_type.as_deref()),
                ),
                reason: bounce.and_then(|b| b.message),
            }
        }
        "email.complained" => DeliveryEventKind::Complained,
        other => DeliveryEventKind::Other(other.to_string()),
    };

    Ok(DeliveryEvent {
        kind,
        email,
        provider_message_id: payload.data.email_id,
        occurred_at: payload.created_at,
    })
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Whether an address must stop receiving notifications.
pub fn should_suppress(hard_bounces_in_window: i64, complained: bool) -> bool {
    complained || hard_bounces_in_window >= HARD_BOUNCE_THRESHOLD
}

/// Reason stored alongside a suppression, or `None` if not suppressed.
pub fn suppression_reason(hard_bounces_in_window: i64, complained: bool) -> Option<&'static str> {
    if complained {
        Some(REASON_COMPLAINT)
    } else if hard_bounces_in_window >= HARD_BOUNCE_THRESHOLD {
        Some(REASON_HARD_BOUNCES)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
