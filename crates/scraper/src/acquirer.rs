//! Strategy-driven page acquisition with a static fallback.

use std::borrow::Cow;

use relwatch_core::strategy::{build_acquisition_script, ContentMode, ScrapingStrategy};

use crate::browser::BrowserClient;
use crate::error::AcquireError;
use crate::fetch::{html_to_text, StaticFetcher};

/// Which path produced the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionSource {
    Browser,
    Static,
}

impl AcquisitionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionSource::Browser => "browser",
            AcquisitionSource::Static => "static",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredContent {
    pub content: String,
    pub source: AcquisitionSource,
    /// Markup or visible text.
    pub mode: ContentMode,
}

impl AcquiredContent {
    /// The text handed to extraction. Markup is reduced to its visible body
    /// text so head scripts and styles never reach the model.
    pub fn extraction_text(&self) -> Cow<'_, str> {
        match self.mode {
            ContentMode::Html => Cow::Owned(html_to_text(&self.content)),
            ContentMode::Text => Cow::Borrowed(&self.content),
        }
    }
}

pub struct ContentAcquirer {
    browser: Option<BrowserClient>,
    fetcher: StaticFetcher,
}

impl ContentAcquirer {
    /// With `browser` unset every call goes straight to the static fetch.
    pub fn new(browser: Option<BrowserClient>, fetcher: StaticFetcher) -> Self {
        Self { browser, fetcher }
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    /// Run the strategy on the remote browser. Failures propagate.
    pub async fn acquire(
        &self,
        url: &str,
        strategy: &ScrapingStrategy,
    ) -> Result<AcquiredContent, AcquireError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| AcquireError::NotConfigured("BROWSER_ENDPOINT".to_string()))?;

        let script = build_acquisition_script(url, strategy);
        let output = browser.execute(&script).await?;

        let mode = match output.content_type.as_deref() {
            Some(ct) if ct.starts_with("text/plain") => ContentMode::Text,
            Some(ct) if ct.starts_with("text/html") => ContentMode::Html,
            _ => strategy.content_mode(),
        };

        Ok(AcquiredContent {
            content: output.data,
            source: AcquisitionSource::Browser,
            mode,
        })
    }

    /// Fetch the page without a browser.
    pub async fn acquire_static(&self, url: &str) -> Result<AcquiredContent, AcquireError> {
        let content = self.fetcher.fetch(url).await?;
        Ok(AcquiredContent {
            content,
            source: AcquisitionSource::Static,
            mode: ContentMode::Text,
        })
    }

    /// Try the browser first and fall back to a static fetch on any
    /// failure. Only the static error is returned if both fail.
    pub async fn acquire_with_fallback(
        &self,
        url: &str,
        strategy: &ScrapingStrategy,
    ) -> Result<AcquiredContent, AcquireError> {
        if self.browser.is_none() {
            return self.acquire_static(url).await;
        }

        match self.acquire(url, strategy).await {
            Ok(content) if !content.extraction_text().trim().is_empty() => Ok(content),
            Ok(_) => {
                tracing::warn!(url, "Browser returned empty content, falling back to static fetch");
                self.acquire_static(url).await
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Browser acquisition failed, falling back to static fetch");
                self.acquire_static(url).await
            }
        }
    }
}
