//! Software catalog entity.

use relwatch_core::strategy::ScrapingStrategy;
use relwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `software` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Software {
    pub id: DbId,
    pub name: String,
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub website: Option<String>,
    pub version_check_url: Option<String>,
    pub scraping_strategy: Option<serde_json::Value>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Software {
    /// The page to scrape: the explicit check URL, else the website.
    pub fn check_url(&self) -> Option<&str> {
        self.version_check_url
            .as_deref()
            .or(self.website.as_deref())
            .filter(|u| !u.trim().is_empty())
    }

    /// Decode the stored strategy. No stored strategy means the default one.
    pub fn strategy(&self) -> Result<ScrapingStrategy, serde_json::Error> {
        match &self.scraping_strategy {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone()),
            _ => Ok(ScrapingStrategy::default()),
        }
    }
}

/// DTO for inserting a catalog entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSoftware {
    pub name: String,
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub website: Option<String>,
    pub version_check_url: Option<String>,
    pub scraping_strategy: Option<serde_json::Value>,
}
