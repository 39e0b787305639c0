use relwatch_core::types::DbId;
use relwatch_scraper::{AcquireError, LlmError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The stored `scraping_strategy` JSON does not decode.
    #[error("Invalid scraping strategy for software {software_id}: {source}")]
    Strategy {
        software_id: DbId,
        source: serde_json::Error,
    },
}
