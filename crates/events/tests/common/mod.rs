//! Shared fixtures for the events integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use relwatch_db::models::software::CreateSoftware;
use relwatch_db::models::user_settings::CreateUserSettings;
use relwatch_db::models::version_history::NewVersion;
use relwatch_db::repositories::{SoftwareRepo, TrackingRepo, UserSettingsRepo, VersionHistoryRepo};
use relwatch_events::delivery::email::EmailError;
use relwatch_events::{EmailSender, OutgoingEmail, SendReceipt};
use sqlx::PgPool;

pub async fn seed_user(pool: &PgPool, user_id: i64, timezone: &str, frequency: &str) {
    UserSettingsRepo::upsert(
        pool,
        &CreateUserSettings {
            user_id,
            email: format!("user{user_id}@example.com"),
            timezone: timezone.to_string(),
            digest_frequency: frequency.to_string(),
        },
    )
    .await
    .unwrap();
}

pub async fn seed_software(pool: &PgPool, name: &str) -> i64 {
    SoftwareRepo::create(
        pool,
        &CreateSoftware {
            name: name.to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id
}

pub async fn seed_version(pool: &PgPool, software_id: i64, version: &str) {
    VersionHistoryRepo::insert_if_new(
        pool,
        &NewVersion {
            software_id,
            version: version.to_string(),
            release_date: None,
            notes: None,
            version_type: None,
        },
    )
    .await
    .unwrap()
    .unwrap();
}

pub async fn track(pool: &PgPool, user_id: i64, software_id: i64, watermark: Option<&str>) {
    TrackingRepo::track(pool, user_id, software_id, watermark)
        .await
        .unwrap();
}

/// Records every message instead of sending it; can be told to fail.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub fail: bool,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, EmailError> {
        if self.fail {
            return Err(EmailError::Build("smtp unavailable".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(SendReceipt {
            message_id: Some(format!("msg-{}", sent.len())),
        })
    }
}
