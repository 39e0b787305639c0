//! Well-known email type names and queue payloads.
//!
//! The type constants must match the values stored in the
//! `email_queue.email_type` column and used by the renderer.

use serde::{Deserialize, Serialize};

use crate::changes::UpdateSummary;
use crate::types::DbId;

/// Digest listing one or more new releases.
pub const EMAIL_TYPE_VERSION_DIGEST: &str = "version_digest";

/// Digest sent when nothing the user tracks changed in the period.
pub const EMAIL_TYPE_ALL_QUIET: &str = "all_quiet";

/// Monthly nudge for users who track no software at all.
pub const EMAIL_TYPE_NO_TRACKING_REMINDER: &str = "no_tracking_reminder";

/// Idempotency key scope shared by the populated and the "all quiet"
/// digest, so a period can only ever hold one of the two.
pub const DIGEST_KEY_SCOPE: &str = "digest";

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Sponsor placement shown at the bottom of an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorSlot {
    pub sponsor_id: DbId,
    pub name: String,
    pub link_url: String,
}

/// Content of a queue entry, stored as JSONB in `email_queue.payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmailPayload {
    VersionDigest {
        frequency: String,
        updates: Vec<UpdateSummary>,
        #[serde(default)]
        omitted: usize,
        #[serde(default)]
        sponsor: Option<SponsorSlot>,
    },
    AllQuiet {
        frequency: String,
        message: String,
        #[serde(default)]
        sponsor: Option<SponsorSlot>,
    },
    NoTrackingReminder,
}

impl EmailPayload {
    /// The `email_type` column value for this payload.
    pub fn email_type(&self) -> &'static str {
        match self {
            EmailPayload::VersionDigest { .. } => EMAIL_TYPE_VERSION_DIGEST,
            EmailPayload::AllQuiet { .. } => EMAIL_TYPE_ALL_QUIET,
            EmailPayload::NoTrackingReminder => EMAIL_TYPE_NO_TRACKING_REMINDER,
        }
    }

    /// Updates whose delivery should advance the user's watermarks.
    pub fn updates(&self) -> &[UpdateSummary] {
        match self {
            EmailPayload::VersionDigest { updates, .. } => updates,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_tagged_by_kind() {
        let payload = EmailPayload::AllQuiet {
            frequency: "weekly".into(),
            message: "Nothing new.".into(),
            sponsor: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "all_quiet");
        assert_eq!(payload.email_type(), EMAIL_TYPE_ALL_QUIET);
        assert!(payload.updates().is_empty());

        let back: EmailPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn reminder_payload_has_no_fields() {
        let json = serde_json::to_value(EmailPayload::NoTrackingReminder).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "no_tracking_reminder"}));
    }
}
