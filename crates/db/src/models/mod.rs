//! Row structs and insert DTOs.
//!
//! Each submodule holds a `FromRow` entity matching a table and, where the
//! core writes to that table, a `Create*`/`New*` DTO for inserts.

pub mod bounce;
pub mod email_queue;
pub mod software;
pub mod sponsor;
pub mod tracking;
pub mod user_settings;
pub mod version_history;
