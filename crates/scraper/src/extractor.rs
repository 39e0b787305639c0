//! Turns acquired page content into version records.

use std::sync::Arc;

use relwatch_core::extraction::{build_extraction_prompt, parse_extraction_response, ExtractionOutcome};

use crate::error::LlmError;
use crate::llm::CompletionProvider;

pub struct ExtractionEngine {
    provider: Arc<dyn CompletionProvider>,
}

impl ExtractionEngine {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Ask the model for every version of `product_name` in `content`.
    ///
    /// Transport and API failures propagate. An unusable reply is logged and
    /// returned as [`ExtractionOutcome::Malformed`].
    pub async fn extract_versions(
        &self,
        product_name: &str,
        content: &str,
    ) -> Result<ExtractionOutcome, LlmError> {
        if content.trim().is_empty() {
            return Ok(ExtractionOutcome::Empty);
        }

        let prompt = build_extraction_prompt(product_name, content);
        let reply = self.provider.complete(&prompt).await?;
        let outcome = parse_extraction_response(&reply);

        match &outcome {
            ExtractionOutcome::Malformed { reason } => {
                tracing::warn!(
                    product = product_name,
                    provider = self.provider.name(),
                    reason = %reason,
                    "Model reply could not be parsed; treating as no versions",
                );
            }
            ExtractionOutcome::Versions(v) => {
                tracing::debug!(product = product_name, count = v.len(), "Extracted versions");
            }
            ExtractionOutcome::Empty => {
                tracing::debug!(product = product_name, "No versions found");
            }
        }

        Ok(outcome)
    }
}
