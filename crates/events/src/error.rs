use relwatch_core::error::CoreError;

use crate::delivery::email::EmailError;

#[derive(Debug, thiserror::Error)]
pub enum EventsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// Webhook body did not match its signature.
    #[error("Invalid webhook signature")]
    InvalidSignature,
}
