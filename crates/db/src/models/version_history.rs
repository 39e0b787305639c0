//! Version history entity.

use chrono::NaiveDate;
use relwatch_core::changes::SoftwareVersionRecord;
use relwatch_core::types::{DbId, Timestamp};
use relwatch_core::version::VersionRecord;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `software_version_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VersionHistory {
    pub id: DbId,
    pub software_id: DbId,
    pub version: String,
    pub release_date: Option<NaiveDate>,
    pub detected_at: Timestamp,
    pub notes: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub version_type: Option<String>,
    pub newsletter_verified: bool,
    pub is_current_override: bool,
}

/// DTO for recording a detected version.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub software_id: DbId,
    /// Already normalized.
    pub version: String,
    pub release_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub version_type: Option<String>,
}

impl VersionRecord for VersionHistory {
    fn version(&self) -> &str {
        &self.version
    }

    fn release_date(&self) -> Option<NaiveDate> {
        self.release_date
    }

    fn detected_at(&self) -> Timestamp {
        self.detected_at
    }

    fn is_verified(&self) -> bool {
        self.newsletter_verified
    }

    fn is_current_override(&self) -> bool {
        self.is_current_override
    }
}

impl SoftwareVersionRecord for VersionHistory {
    fn software_id(&self) -> DbId {
        self.software_id
    }

    fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    fn classification(&self) -> Option<&str> {
        self.version_type.as_deref()
    }
}
