//! Acquire a product page and extract its versions.
//!
//! Shared by the version check and the audit pass. Browser and model calls
//! are each paced by their own [`RateLimiter`].

use std::sync::Arc;

use relwatch_core::extraction::ExtractedVersion;
use relwatch_core::version::{normalize_version, should_ignore_version};
use relwatch_db::models::software::Software;
use relwatch_scraper::{AcquisitionSource, ContentAcquirer, ExtractionEngine};

use crate::error::PipelineError;
use crate::limiter::RateLimiter;

/// Versions read from one product page.
#[derive(Debug, Clone)]
pub struct PageScan {
    pub source: AcquisitionSource,
    /// Normalized, channel-filtered, deduplicated; page order kept.
    pub versions: Vec<ExtractedVersion>,
}

impl PageScan {
    pub fn version_strings(&self) -> Vec<String> {
        self.versions.iter().map(|v| v.version.clone()).collect()
    }
}

pub struct Scanner {
    acquirer: ContentAcquirer,
    extractor: ExtractionEngine,
    browser_limiter: Arc<RateLimiter>,
    llm_limiter: Arc<RateLimiter>,
}

impl Scanner {
    pub fn new(
        acquirer: ContentAcquirer,
        extractor: ExtractionEngine,
        browser_limiter: Arc<RateLimiter>,
        llm_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            acquirer,
            extractor,
            browser_limiter,
            llm_limiter,
        }
    }

    /// Scan the product's check page. `Ok(None)` when it has no URL.
    pub async fn scan(&self, software: &Software) -> Result<Option<PageScan>, PipelineError> {
        let Some(url) = software.check_url() else {
            return Ok(None);
        };
        let strategy = software
            .strategy()
            .map_err(|source| PipelineError::Strategy {
                software_id: software.id,
                source,
            })?;

        if self.acquirer.has_browser() {
            self.browser_limiter.acquire().await;
        }
        let page = self.acquirer.acquire_with_fallback(url, &strategy).await?;
        let text = page.extraction_text();
        tracing::debug!(
            software_id = software.id,
            source = page.source.as_str(),
            bytes = page.content.len(),
            text_chars = text.len(),
            "Page acquired"
        );

        self.llm_limiter.acquire().await;
        let outcome = self.extractor.extract_versions(&software.name, &text).await?;

        Ok(Some(PageScan {
            source: page.source,
            versions: clean_versions(&software.name, outcome.into_versions()),
        }))
    }
}

/// Normalize each version, drop the other release channel and repeats.
fn clean_versions(software_name: &str, raw: Vec<ExtractedVersion>) -> Vec<ExtractedVersion> {
    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .filter_map(|mut v| {
            v.version = normalize_version(&v.version, software_name);
            if v.version.is_empty() || should_ignore_version(software_name, &v.version) {
                return None;
            }
            seen.insert(v.version.clone()).then_some(v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(version: &str) -> ExtractedVersion {
        ExtractedVersion {
            version: version.to_string(),
            release_date: None,
            notes: None,
            classification: None,
        }
    }

    #[test]
    fn cleaning_normalizes_filters_and_dedupes() {
        let cleaned = clean_versions(
            "Cobra",
            vec![raw("cobra_v125"), raw("v125"), raw("2.0.0-beta1"), raw("1.2.4"), raw("  ")],
        );
        let versions: Vec<&str> = cleaned.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(versions, vec!["125", "1.2.4"]);
    }

    #[test]
    fn beta_products_keep_only_beta_versions() {
        let cleaned = clean_versions("Serum Beta", vec![raw("1.0.0"), raw("1.1.0-beta2")]);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].version, "1.1.0-beta2");
    }
}
