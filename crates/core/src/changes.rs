//! Change detection against per-user watermarks.
//!
//! Given the software a user tracks and the history rows detected within the
//! digest lookback window, [`detect_updates`] decides which releases are
//! genuinely new to that user.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::DbId;
use crate::version::{compare_versions, should_ignore_version, VersionRecord};

/// Maximum number of update items rendered into one digest email.
pub const MAX_UPDATES_PER_EMAIL: usize = 10;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One (user, software) tracking relation with the user's watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedItem {
    pub software_id: DbId,
    pub software_name: String,
    pub last_notified_version: Option<String>,
}

/// A history row that knows which software it belongs to.
pub trait SoftwareVersionRecord: VersionRecord {
    fn software_id(&self) -> DbId;
    fn notes(&self) -> Option<&str>;
    fn classification(&self) -> Option<&str>;
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// A single "X moved from A to B" line of a digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub software_id: DbId,
    pub software_name: String,
    pub previous_version: Option<String>,
    pub new_version: String,
    pub release_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub classification: Option<String>,
}

/// Result of one detection pass for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedUpdates {
    /// Updates in detection order, at most the per-email cap.
    pub updates: Vec<UpdateSummary>,
    /// Qualifying updates dropped because of the cap.
    pub omitted: usize,
}

impl DetectedUpdates {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Compare one candidate against the user's watermark.
///
/// With no watermark, anything counts as new.
pub fn is_new_to_user(candidate: &str, watermark: Option<&str>) -> bool {
    match watermark {
        None => true,
        Some(w) => compare_versions(candidate, w) == Ordering::Greater,
    }
}

/// Find the updates a user has not been notified about.
///
/// `history` must be ordered newest detection first and already restricted
/// to the lookback window. For each software the first record that belongs
/// to the product's channel wins; later records for the same software are
/// skipped even when the winner turns out not to be new.
pub fn detect_updates<R: SoftwareVersionRecord>(
    tracked: &[TrackedItem],
    history: &[R],
    max_per_email: usize,
) -> DetectedUpdates {
    let by_software: HashMap<DbId, &TrackedItem> =
        tracked.iter().map(|t| (t.software_id, t)).collect();
    let mut processed: HashSet<DbId> = HashSet::new();
    let mut updates = Vec::new();

    for record in history {
        let Some(item) = by_software.get(&record.software_id()) else {
            continue;
        };
        if should_ignore_version(&item.software_name, record.version()) {
            continue;
        }
        if !processed.insert(item.software_id) {
            continue;
        }
        if !is_new_to_user(record.version(), item.last_notified_version.as_deref()) {
            continue;
        }

        updates.push(UpdateSummary {
            software_id: item.software_id,
            software_name: item.software_name.clone(),
            previous_version: item.last_notified_version.clone(),
            new_version: record.version().to_string(),
            release_date: record.release_date(),
            notes: record.notes().map(str::to_string),
            classification: record.classification().map(str::to_string),
        });
    }

    let omitted = updates.len().saturating_sub(max_per_email);
    updates.truncate(max_per_email);

    DetectedUpdates { updates, omitted }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use chrono::{TimeZone, Utc};

    struct Row {
        software_id: DbId,
        version: &'static str,
        detected_at: Timestamp,
    }

    impl VersionRecord for Row {
        fn version(&self) -> &str {
            self.version
        }
        fn release_date(&self) -> Option<NaiveDate> {
            None
        }
        fn detected_at(&self) -> Timestamp {
            self.detected_at
        }
        fn is_verified(&self) -> bool {
            true
        }
        fn is_current_override(&self) -> bool {
            false
        }
    }

    impl SoftwareVersionRecord for Row {
        fn software_id(&self) -> DbId {
            self.software_id
        }
        fn notes(&self) -> Option<&str> {
            Some("notes")
        }
        fn classification(&self) -> Option<&str> {
            Some("minor")
        }
    }

    fn row(software_id: DbId, version: &'static str, hour: u32) -> Row {
        Row {
            software_id,
            version,
            detected_at: Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap(),
        }
    }

    fn tracked(software_id: DbId, name: &str, watermark: Option<&str>) -> TrackedItem {
        TrackedItem {
            software_id,
            software_name: name.to_string(),
            last_notified_version: watermark.map(str::to_string),
        }
    }

    #[test]
    fn newer_version_is_an_update() {
        let items = vec![tracked(1, "X", Some("1.0.0"))];
        let history = vec![row(1, "1.1.0", 10), row(1, "1.0.0", 5)];
        let detected = detect_updates(&items, &history, MAX_UPDATES_PER_EMAIL);
        assert_eq!(detected.updates.len(), 1);
        let update = &detected.updates[0];
        assert_eq!(update.previous_version.as_deref(), Some("1.0.0"));
        assert_eq!(update.new_version, "1.1.0");
        assert_eq!(update.notes.as_deref(), Some("notes"));
        assert_eq!(detected.omitted, 0);
    }

    #[test]
    fn same_or_older_version_is_not_an_update() {
        let items = vec![tracked(1, "X", Some("2.0"))];
        let history = vec![row(1, "2.0.0", 10), row(1, "1.9", 5)];
        assert!(detect_updates(&items, &history, 10).is_empty());
    }

    #[test]
    fn missing_watermark_always_qualifies() {
        let items = vec![tracked(1, "X", None)];
        let history = vec![row(1, "0.1", 1)];
        assert_eq!(detect_updates(&items, &history, 10).updates.len(), 1);
    }

    #[test]
    fn first_match_wins_per_software() {
        let items = vec![tracked(1, "X", Some("1.5"))];
        // Newest detection is not new to the user; the older-detected 2.0
        // row must not be considered.
        let history = vec![row(1, "1.4", 10), row(1, "2.0", 5)];
        assert!(detect_updates(&items, &history, 10).is_empty());
    }

    #[test]
    fn untracked_software_is_ignored() {
        let items = vec![tracked(1, "X", None)];
        let history = vec![row(2, "9.9", 10)];
        assert!(detect_updates(&items, &history, 10).is_empty());
    }

    #[test]
    fn off_channel_rows_are_skipped_before_first_match() {
        let items = vec![tracked(1, "Blender", Some("4.2"))];
        let history = vec![row(1, "4.4-beta", 12), row(1, "4.3", 8)];
        let detected = detect_updates(&items, &history, 10);
        assert_eq!(detected.updates.len(), 1);
        assert_eq!(detected.updates[0].new_version, "4.3");
    }

    #[test]
    fn cap_drops_and_counts_overflow() {
        let items: Vec<TrackedItem> = (1..=5).map(|id| tracked(id, "P", None)).collect();
        let history: Vec<Row> = (1..=5).map(|id| row(id, "1.0", 10)).collect();
        let detected = detect_updates(&items, &history, 3);
        assert_eq!(detected.updates.len(), 3);
        assert_eq!(detected.omitted, 2);
        let ids: Vec<DbId> = detected.updates.iter().map(|u| u.software_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
