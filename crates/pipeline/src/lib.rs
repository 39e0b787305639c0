//! Version-check and audit batch jobs.
//!
//! [`VersionChecker`] walks today's slice of the catalog, acquires each
//! product's release page, extracts versions and records the new ones.
//! [`VersionAuditor`] re-reads the same pages to confirm stored versions and
//! flag products whose resolved current version disagrees with the page.

pub mod audit;
pub mod error;
pub mod limiter;
pub mod scanner;
pub mod version_check;

pub use audit::{AuditReport, VersionAuditor, VersionMismatch};
pub use error::PipelineError;
pub use limiter::RateLimiter;
pub use scanner::{PageScan, Scanner};
pub use version_check::{CheckSettings, VersionChecker};
