//! Email queue status machine and retry policy.
//!
//! Status values are stored as text in `email_queue.status`; the queue
//! repository and the sender both go through this module to move rows.

use chrono::Duration;

/// Attempts allowed before a queue row is marked failed.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Delay before the first retry.
pub const BASE_RETRY_DELAY_SECS: i64 = 60;

/// Upper bound on the retry delay.
pub const MAX_RETRY_DELAY_SECS: i64 = 3600;

/// How long a `processing` row belongs to the sender that claimed it.
/// After that it is treated as abandoned and may be claimed again.
pub const CLAIM_LEASE_SECS: i64 = 15 * 60;

pub fn claim_lease() -> Duration {
    Duration::seconds(CLAIM_LEASE_SECS)
}

// ---------------------------------------------------------------------------
// QueueStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Cancelled,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Sent => "sent",
            QueueStatus::Failed => "failed",
            QueueStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QueueStatus::Pending),
            "processing" => Some(QueueStatus::Processing),
            "sent" => Some(QueueStatus::Sent),
            "failed" => Some(QueueStatus::Failed),
            "cancelled" => Some(QueueStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueStatus::Sent | QueueStatus::Failed | QueueStatus::Cancelled
        )
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Statuses reachable from `from`. Terminal statuses return an empty slice.
pub fn valid_transitions(from: QueueStatus) -> &'static [QueueStatus] {
    match from {
        // Pending -> Processing, Cancelled
        QueueStatus::Pending => &[QueueStatus::Processing, QueueStatus::Cancelled],
        // Processing -> Sent, Failed, Cancelled, Pending (retry)
        QueueStatus::Processing => &[
            QueueStatus::Sent,
            QueueStatus::Failed,
            QueueStatus::Cancelled,
            QueueStatus::Pending,
        ],
        QueueStatus::Sent | QueueStatus::Failed | QueueStatus::Cancelled => &[],
    }
}

pub fn can_transition(from: QueueStatus, to: QueueStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// Validate a state transition, returning an error message for invalid ones.
pub fn validate_transition(from: QueueStatus, to: QueueStatus) -> Result<(), String> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(format!("Invalid queue transition: {from} -> {to}"))
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Backoff before retry number `attempt` (1-based): 60 s doubling each
/// attempt, capped at [`MAX_RETRY_DELAY_SECS`].
pub fn retry_delay(attempt: i32) -> Duration {
    let exp = attempt.saturating_sub(1).clamp(0, 16) as u32;
    let secs = BASE_RETRY_DELAY_SECS
        .saturating_mul(2i64.pow(exp))
        .min(MAX_RETRY_DELAY_SECS);
    Duration::seconds(secs)
}

/// Status a row moves to after its `attempts`-th failed send.
pub fn next_status_after_failure(attempts: i32, max_attempts: i32) -> QueueStatus {
    if attempts >= max_attempts {
        QueueStatus::Failed
    } else {
        QueueStatus::Pending
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
