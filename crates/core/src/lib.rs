//! Pure domain logic for relwatch.
//!
//! Nothing in this crate performs I/O. It is shared by the database layer,
//! the scraper clients, the email/event services and the worker binary:
//!
//! - [`version`]: normalization, ordering, current-version resolution.
//! - [`strategy`]: scraping strategies and remote browser scripts.
//! - [`extraction`]: language-model prompt and response parsing.
//! - [`changes`]: update detection against per-user watermarks.
//! - [`schedule`]: timezone-aware send times and idempotency keys.
//! - [`queue`]: email queue status machine and retry policy.
//! - [`suppression`]: delivery events and the suppression rule.

pub mod batch;
pub mod changes;
pub mod email_types;
pub mod error;
pub mod extraction;
pub mod filler;
pub mod queue;
pub mod rotation;
pub mod schedule;
pub mod strategy;
pub mod suppression;
pub mod types;
pub mod version;
pub mod webhook_signature;
