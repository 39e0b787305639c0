//! Integration tests for recipient eligibility and one-way suppression.

use chrono::{Duration, Utc};
use relwatch_core::schedule::DigestFrequency;
use relwatch_core::suppression::BounceType;
use relwatch_db::models::bounce::NewBounce;
use relwatch_db::models::software::CreateSoftware;
use relwatch_db::models::user_settings::CreateUserSettings;
use relwatch_db::repositories::{BounceRepo, SoftwareRepo, TrackingRepo, UserSettingsRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(pool: &PgPool, user_id: i64, frequency: &str) {
    UserSettingsRepo::upsert(
        pool,
        &CreateUserSettings {
            user_id,
            email: format!("User{user_id}@Example.com"),
            timezone: "Europe/Berlin".to_string(),
            digest_frequency: frequency.to_string(),
        },
    )
    .await
    .unwrap();
}

async fn seed_software(pool: &PgPool) -> i64 {
    SoftwareRepo::create(
        pool,
        &CreateSoftware {
            name: "Serum".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id
}

fn hard_bounce(user_id: i64, days_ago: i64) -> NewBounce {
    NewBounce {
        user_id: Some(user_id),
        email: format!("user{user_id}@example.com"),
        bounce_type: BounceType::Hard,
        reason: Some("mailbox full".to_string()),
        provider_message_id: None,
        occurred_at: Some(Utc::now() - Duration::days(days_ago)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_digest_recipients_filter_by_frequency_and_tracking(pool: PgPool) {
    let sid = seed_software(&pool).await;
    seed_user(&pool, 1, "weekly").await;
    seed_user(&pool, 2, "daily").await;
    seed_user(&pool, 3, "weekly").await;
    TrackingRepo::track(&pool, 1, sid, None).await.unwrap();
    TrackingRepo::track(&pool, 2, sid, None).await.unwrap();

    let since = Utc::now() - Duration::days(30);
    let weekly = UserSettingsRepo::list_digest_recipients(&pool, DigestFrequency::Weekly, since)
        .await
        .unwrap();
    let ids: Vec<i64> = weekly.iter().map(|u| u.user_id).collect();
    assert_eq!(ids, vec![1], "user 3 tracks nothing and user 2 is daily");

    let idle = UserSettingsRepo::list_without_tracking(&pool, since).await.unwrap();
    assert_eq!(idle.iter().map(|u| u.user_id).collect::<Vec<_>>(), vec![3]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bounce_threshold_excludes_recipient(pool: PgPool) {
    let sid = seed_software(&pool).await;
    seed_user(&pool, 1, "weekly").await;
    TrackingRepo::track(&pool, 1, sid, None).await.unwrap();
    let since = Utc::now() - Duration::days(30);

    // An old bounce outside the window does not count.
    BounceRepo::insert(&pool, &hard_bounce(1, 45)).await.unwrap();
    BounceRepo::insert(&pool, &hard_bounce(1, 2)).await.unwrap();
    BounceRepo::insert(&pool, &hard_bounce(1, 1)).await.unwrap();
    assert_eq!(BounceRepo::count_hard_since(&pool, 1, since).await.unwrap(), 2);
    assert!(UserSettingsRepo::is_eligible(&pool, 1, since).await.unwrap());

    BounceRepo::insert(&pool, &hard_bounce(1, 0)).await.unwrap();
    assert!(!UserSettingsRepo::is_eligible(&pool, 1, since).await.unwrap());
    let weekly = UserSettingsRepo::list_digest_recipients(&pool, DigestFrequency::Weekly, since)
        .await
        .unwrap();
    assert!(weekly.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_disable_notifications_is_one_way(pool: PgPool) {
    seed_user(&pool, 1, "weekly").await;

    assert!(UserSettingsRepo::disable_notifications(&pool, 1, "spam_complaint").await.unwrap());
    assert!(!UserSettingsRepo::disable_notifications(&pool, 1, "hard_bounce_threshold")
        .await
        .unwrap());

    let user = UserSettingsRepo::find_by_email(&pool, "user1@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!user.notifications_enabled);
    assert!(user.notifications_disabled_at.is_some());
    assert_eq!(user.notifications_disabled_reason.as_deref(), Some("spam_complaint"));
    assert_eq!(user.tz(), chrono_tz::Europe::Berlin);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_track_keeps_watermark_and_set_watermark(pool: PgPool) {
    let sid = seed_software(&pool).await;
    seed_user(&pool, 1, "weekly").await;

    TrackingRepo::track(&pool, 1, sid, Some("1.0")).await.unwrap();
    TrackingRepo::track(&pool, 1, sid, None).await.unwrap();
    let row = TrackingRepo::find(&pool, 1, sid).await.unwrap().unwrap();
    assert_eq!(row.last_notified_version.as_deref(), Some("1.0"));

    assert!(TrackingRepo::set_watermark(&pool, 1, sid, "1.1").await.unwrap());
    let tracked = TrackingRepo::list_tracked_for_user(&pool, 1).await.unwrap();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].software_name, "Serum");
    assert_eq!(tracked[0].last_notified_version.as_deref(), Some("1.1"));
    assert_eq!(TrackingRepo::count_for_user(&pool, 1).await.unwrap(), 1);
}
