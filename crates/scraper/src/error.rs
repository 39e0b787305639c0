/// Errors from fetching page content.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote side returned a non-2xx status code.
    #[error("Acquisition endpoint error ({status}): {body}")]
    Api { status: u16, body: String },

    /// No browser endpoint is configured for a browser-only call.
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// Errors from the language-model completion endpoint.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// HTTP 429. `retry_after_secs` comes from the `retry-after` header.
    #[error("LLM rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Not configured: {0}")]
    NotConfigured(String),
}
