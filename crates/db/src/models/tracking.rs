//! User tracking relations.

use relwatch_core::changes::TrackedItem;
use relwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `user_software_tracking` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tracking {
    pub id: DbId,
    pub user_id: DbId,
    pub software_id: DbId,
    pub last_notified_version: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A tracking row joined with the software name.
#[derive(Debug, Clone, FromRow)]
pub struct TrackedSoftware {
    pub software_id: DbId,
    pub software_name: String,
    pub last_notified_version: Option<String>,
}

impl From<TrackedSoftware> for TrackedItem {
    fn from(row: TrackedSoftware) -> Self {
        TrackedItem {
            software_id: row.software_id,
            software_name: row.software_name,
            last_notified_version: row.last_notified_version,
        }
    }
}
