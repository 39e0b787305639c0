//! Outbound email seam.
//!
//! The queue sender only knows [`EmailSender`]; production wires in the
//! SMTP-backed [`email::EmailDelivery`].

use async_trait::async_trait;

use self::email::EmailError;

pub mod email;

/// A fully rendered plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// What the transport reported back for an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, EmailError>;
}
