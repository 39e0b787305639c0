//! Remote clients used by the version-check pipeline.
//!
//! - [`BrowserClient`] runs acquisition scripts on a browserless-compatible
//!   `/function` endpoint.
//! - [`StaticFetcher`] is the plain-HTTP fallback.
//! - [`ContentAcquirer`] combines the two.
//! - [`AnthropicProvider`] and [`ExtractionEngine`] turn page content into
//!   structured version records.

pub mod acquirer;
pub mod browser;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod llm;

pub use acquirer::{AcquiredContent, AcquisitionSource, ContentAcquirer};
pub use browser::{BrowserClient, BrowserConfig};
pub use error::{AcquireError, LlmError};
pub use extractor::ExtractionEngine;
pub use fetch::StaticFetcher;
pub use llm::{AnthropicConfig, AnthropicProvider, CompletionProvider};
