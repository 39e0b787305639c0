//! Client for a browserless-compatible remote browser.
//!
//! Scripts produced by [`relwatch_core::strategy::build_acquisition_script`]
//! are posted as `application/javascript` to `{endpoint}/function?token=...`.
//! The endpoint replies with the script's `data` as the body and its `type`
//! as the content type.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;

use crate::error::AcquireError;

/// Default bound on one `/function` call. Covers navigation, selector
/// waits and the settle delay.
pub const DEFAULT_BROWSER_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Base URL, e.g. `https://chrome.browserless.io`.
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

/// Body and content type returned by a script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOutput {
    pub data: String,
    pub content_type: Option<String>,
}

#[derive(Debug)]
pub struct BrowserClient {
    client: reqwest::Client,
    config: BrowserConfig,
}

impl BrowserClient {
    pub fn new(config: BrowserConfig) -> Result<Self, AcquireError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn function_url(&self) -> String {
        format!("{}/function", self.config.endpoint.trim_end_matches('/'))
    }

    /// Run one acquisition script and return what it produced.
    pub async fn execute(&self, script: &str) -> Result<BrowserOutput, AcquireError> {
        let mut request = self
            .client
            .post(self.function_url())
            .header(CONTENT_TYPE, "application/javascript")
            .body(script.to_string());
        if let Some(token) = &self.config.token {
            request = request.query(&[("token", token)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AcquireError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response.text().await?;

        tracing::debug!(bytes = data.len(), content_type = ?content_type, "Browser script finished");
        Ok(BrowserOutput { data, content_type })
    }
}
