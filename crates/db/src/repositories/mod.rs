//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod bounce_repo;
pub mod email_queue_repo;
pub mod software_repo;
pub mod sponsor_repo;
pub mod tracking_repo;
pub mod user_settings_repo;
pub mod version_history_repo;

pub use bounce_repo::BounceRepo;
pub use email_queue_repo::EmailQueueRepo;
pub use software_repo::SoftwareRepo;
pub use sponsor_repo::SponsorRepo;
pub use tracking_repo::TrackingRepo;
pub use user_settings_repo::UserSettingsRepo;
pub use version_history_repo::VersionHistoryRepo;
