//! Email scheduling, delivery and suppression for relwatch.
//!
//! - [`DigestScheduler`] and [`NoTrackingReminderScheduler`] write
//!   idempotent rows into the email queue.
//! - [`QueueSender`] claims due rows and hands them to an [`EmailSender`].
//! - [`SuppressionEngine`] consumes provider delivery events and turns
//!   notifications off for addresses that keep failing.

pub mod delivery;
pub mod digest;
pub mod error;
pub mod reminder;
pub mod render;
pub mod sender;
pub mod suppression;

pub use delivery::email::{EmailConfig, EmailDelivery, EmailError};
pub use delivery::{EmailSender, OutgoingEmail, SendReceipt};
pub use digest::DigestScheduler;
pub use error::EventsError;
pub use reminder::NoTrackingReminderScheduler;
pub use sender::{QueueSender, SendOutcome};
pub use suppression::{SuppressionEngine, SuppressionOutcome};
