//! Periodic audit of stored versions.
//!
//! Re-scans a rotation of the catalog, marks history rows that the second
//! extraction confirms as verified, and lists products whose resolved
//! current version disagrees with the newest version on the page.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::NaiveDate;
use relwatch_core::batch::BatchReport;
use relwatch_core::rotation::{daily_rotation, day_index};
use relwatch_core::types::DbId;
use relwatch_core::version::compare_versions;
use relwatch_db::models::software::Software;
use relwatch_db::repositories::{SoftwareRepo, VersionHistoryRepo};
use relwatch_db::DbPool;
use serde::Serialize;

use crate::error::PipelineError;
use crate::scanner::Scanner;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionMismatch {
    pub software_id: DbId,
    pub software_name: String,
    pub stored: Option<String>,
    pub on_page: String,
}

#[derive(Debug, Default, Serialize)]
pub struct AuditReport {
    pub batch: BatchReport,
    pub verified_rows: u64,
    pub mismatches: Vec<VersionMismatch>,
}

pub struct VersionAuditor {
    pool: DbPool,
    scanner: Arc<Scanner>,
    batch_size: usize,
}

impl VersionAuditor {
    pub fn new(pool: DbPool, scanner: Arc<Scanner>, batch_size: usize) -> Self {
        Self {
            pool,
            scanner,
            batch_size,
        }
    }

    /// Audit today's slice. Products are scanned one at a time.
    pub async fn run_once(&self, today: NaiveDate) -> Result<AuditReport, PipelineError> {
        let catalog = SoftwareRepo::list_active(&self.pool).await?;
        let batch = daily_rotation(&catalog, self.batch_size, day_index(today));
        let mut report = AuditReport::default();

        for software in &batch {
            match self.audit_one(software).await {
                Ok(Some((verified, mismatch))) => {
                    report.verified_rows += verified;
                    report.mismatches.extend(mismatch);
                    report
                        .batch
                        .succeeded(software.id, Some(format!("verified={verified}")));
                }
                Ok(None) => report.batch.skipped(software.id, "no check url"),
                Err(e) => {
                    tracing::error!(software_id = software.id, error = %e, "Audit failed");
                    report.batch.failed(software.id, e);
                }
            }
        }

        tracing::info!(
            total = report.batch.total,
            verified_rows = report.verified_rows,
            mismatches = report.mismatches.len(),
            failed = report.batch.failed,
            "Version audit finished"
        );
        Ok(report)
    }

    /// Rows verified plus a mismatch, if any. `None` when the product has
    /// no check url.
    async fn audit_one(
        &self,
        software: &Software,
    ) -> Result<Option<(u64, Option<VersionMismatch>)>, PipelineError> {
        let Some(scan) = self.scanner.scan(software).await? else {
            return Ok(None);
        };

        let versions = scan.version_strings();
        let verified = VersionHistoryRepo::mark_verified(&self.pool, software.id, &versions).await?;

        let Some(on_page) = versions.iter().max_by(|a, b| compare_versions(a, b)).cloned() else {
            return Ok(Some((verified, None)));
        };
        let stored = VersionHistoryRepo::resolve_current(&self.pool, software.id, false)
            .await?
            .map(|row| row.version);

        let agrees = stored
            .as_deref()
            .is_some_and(|s| compare_versions(s, &on_page) == Ordering::Equal);
        if agrees {
            return Ok(Some((verified, None)));
        }

        tracing::warn!(
            software_id = software.id,
            stored = stored.as_deref().unwrap_or("none"),
            on_page = %on_page,
            "Stored current version disagrees with page"
        );
        Ok(Some((
            verified,
            Some(VersionMismatch {
                software_id: software.id,
                software_name: software.name.clone(),
                stored,
                on_page,
            }),
        )))
    }
}
