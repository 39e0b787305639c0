use relwatch_core::email_types::SponsorSlot;
use relwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `sponsor_placements` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SponsorPlacement {
    pub id: DbId,
    pub name: String,
    pub link_url: String,
    pub is_active: bool,
    pub impressions: i64,
    pub clicks: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SponsorPlacement {
    pub fn slot(&self) -> SponsorSlot {
        SponsorSlot {
            sponsor_id: self.id,
            name: self.name.clone(),
            link_url: self.link_url.clone(),
        }
    }
}
