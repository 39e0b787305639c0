//! Daily version check.
//!
//! Each run takes today's rotation of the active catalog, scans the pages
//! with bounded concurrency and inserts versions not yet in the history.
//! One product failing never stops the batch.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use relwatch_core::batch::BatchReport;
use relwatch_core::rotation::{daily_rotation, day_index};
use relwatch_db::models::software::Software;
use relwatch_db::models::version_history::NewVersion;
use relwatch_db::repositories::{SoftwareRepo, VersionHistoryRepo};
use relwatch_db::DbPool;

use crate::error::PipelineError;
use crate::scanner::Scanner;

/// Products checked per day; zero checks the whole catalog.
pub const DEFAULT_CHECK_BATCH_SIZE: usize = 50;

/// Products scanned at the same time.
pub const DEFAULT_CHECK_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct CheckSettings {
    pub batch_size: usize,
    pub concurrency: usize,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_CHECK_BATCH_SIZE,
            concurrency: DEFAULT_CHECK_CONCURRENCY,
        }
    }
}

/// Result of checking one product.
#[derive(Debug)]
enum CheckResult {
    Checked { found: usize, inserted: Vec<String> },
    NoUrl,
}

pub struct VersionChecker {
    pool: DbPool,
    scanner: Arc<Scanner>,
    settings: CheckSettings,
}

impl VersionChecker {
    pub fn new(pool: DbPool, scanner: Arc<Scanner>, settings: CheckSettings) -> Self {
        Self {
            pool,
            scanner,
            settings,
        }
    }

    /// Check today's slice of the active catalog.
    pub async fn run_once(&self, today: NaiveDate) -> Result<BatchReport, PipelineError> {
        let catalog = SoftwareRepo::list_active(&self.pool).await?;
        let batch = daily_rotation(&catalog, self.settings.batch_size, day_index(today));
        tracing::info!(
            catalog = catalog.len(),
            batch = batch.len(),
            concurrency = self.settings.concurrency,
            "Starting version check"
        );

        let results: Vec<(i64, Result<CheckResult, PipelineError>)> = stream::iter(batch.iter())
            .map(|software| async move { (software.id, self.check_one(software).await) })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut report = BatchReport::new();
        for (software_id, result) in results {
            match result {
                Ok(CheckResult::Checked { found, inserted }) => {
                    let detail = if inserted.is_empty() {
                        format!("found={found} new=0")
                    } else {
                        format!("found={found} new={}", inserted.join(","))
                    };
                    report.succeeded(software_id, Some(detail));
                }
                Ok(CheckResult::NoUrl) => report.skipped(software_id, "no check url"),
                Err(e) => {
                    tracing::error!(software_id, error = %e, "Version check failed");
                    report.failed(software_id, e);
                }
            }
        }

        tracing::info!(
            total = report.total,
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            "Version check finished"
        );
        Ok(report)
    }

    async fn check_one(&self, software: &Software) -> Result<CheckResult, PipelineError> {
        let Some(scan) = self.scanner.scan(software).await? else {
            tracing::warn!(software_id = software.id, name = %software.name, "No check url");
            return Ok(CheckResult::NoUrl);
        };

        let mut inserted = Vec::new();
        for v in &scan.versions {
            let row = VersionHistoryRepo::insert_if_new(
                &self.pool,
                &NewVersion {
                    software_id: software.id,
                    version: v.version.clone(),
                    release_date: v.release_date,
                    notes: v.notes.clone(),
                    version_type: v.classification.map(|c| c.as_str().to_string()),
                },
            )
            .await?;
            if let Some(row) = row {
                tracing::info!(
                    software_id = software.id,
                    version = %row.version,
                    source = scan.source.as_str(),
                    "New version detected"
                );
                inserted.push(row.version);
            }
        }

        Ok(CheckResult::Checked {
            found: scan.versions.len(),
            inserted,
        })
    }
}
