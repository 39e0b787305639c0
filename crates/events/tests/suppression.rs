//! Integration tests for delivery-event ingestion.

mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use relwatch_core::error::CoreError;
use relwatch_core::suppression::{BounceType, REASON_COMPLAINT, REASON_HARD_BOUNCES};
use relwatch_core::webhook_signature::compute_webhook_signature;
use relwatch_db::repositories::{BounceRepo, SponsorRepo, UserSettingsRepo};
use relwatch_events::{EventsError, SuppressionEngine, SuppressionOutcome};
use sqlx::PgPool;

use common::seed_user;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bounce_body(email: &str, provider_type: &str) -> String {
    format!(
        r#"{{"type": "email.bounced", "data": {{"email_id": "msg", "to": ["{email}"],
            "bounce": {{"type": "{provider_type}", "message": "mailbox unavailable"}}}}}}"#
    )
}

async fn is_enabled(pool: &PgPool, user_id: i64) -> bool {
    UserSettingsRepo::find_by_user_id(pool, user_id)
        .await
        .unwrap()
        .unwrap()
        .notifications_enabled
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn third_hard_bounce_disables_notifications(pool: PgPool) {
    seed_user(&pool, 1, "UTC", "weekly").await;
    let engine = SuppressionEngine::new(pool.clone());
    let body = bounce_body("User1@Example.com", "Permanent");
    let now = Utc::now();

    for _ in 0..2 {
        let outcome = engine.handle_payload(&body, None, now).await.unwrap();
        assert_eq!(outcome, SuppressionOutcome::Recorded { bounce_type: BounceType::Hard });
    }
    assert!(is_enabled(&pool, 1).await);

    let outcome = engine.handle_payload(&body, None, now).await.unwrap();
    assert_eq!(
        outcome,
        SuppressionOutcome::Suppressed { user_id: 1, reason: REASON_HARD_BOUNCES }
    );
    assert!(!is_enabled(&pool, 1).await);

    // Further bounces are stored but the user stays disabled.
    let outcome = engine.handle_payload(&body, None, now).await.unwrap();
    assert_eq!(outcome, SuppressionOutcome::Recorded { bounce_type: BounceType::Hard });
    assert_eq!(BounceRepo::list_for_email(&pool, "user1@example.com").await.unwrap().len(), 4);

    let settings = UserSettingsRepo::find_by_user_id(&pool, 1).await.unwrap().unwrap();
    assert_eq!(settings.notifications_disabled_reason.as_deref(), Some(REASON_HARD_BOUNCES));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn complaint_disables_immediately(pool: PgPool) {
    seed_user(&pool, 1, "UTC", "weekly").await;
    let engine = SuppressionEngine::new(pool.clone());

    let outcome = engine
        .handle_payload(
            r#"{"type": "email.complained", "data": {"to": ["user1@example.com"]}}"#,
            None,
            Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SuppressionOutcome::Suppressed { user_id: 1, reason: REASON_COMPLAINT }
    );
    assert!(!is_enabled(&pool, 1).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn soft_bounce_is_only_logged(pool: PgPool) {
    seed_user(&pool, 1, "UTC", "weekly").await;
    let engine = SuppressionEngine::new(pool.clone());

    let outcome = engine
        .handle_payload(&bounce_body("user1@example.com", "Transient"), None, Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, SuppressionOutcome::Logged);
    assert!(BounceRepo::list_for_email(&pool, "user1@example.com").await.unwrap().is_empty());
    assert!(is_enabled(&pool, 1).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bounce_for_unknown_address_is_stored_without_user(pool: PgPool) {
    let engine = SuppressionEngine::new(pool.clone());
    let outcome = engine
        .handle_payload(&bounce_body("stranger@example.com", "Permanent"), None, Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, SuppressionOutcome::Recorded { bounce_type: BounceType::Hard });

    let records = BounceRepo::list_for_email(&pool, "stranger@example.com").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sponsor_click_is_attributed(pool: PgPool) {
    let sponsor = SponsorRepo::create(&pool, "Plugin Boutique", "https://sponsor.example/pb")
        .await
        .unwrap();
    let engine = SuppressionEngine::new(pool.clone());

    let outcome = engine
        .handle_payload(
            r#"{"type": "email.clicked", "data": {"to": ["user1@example.com"],
                "click": {"link": "https://sponsor.example/pb"}}}"#,
            None,
            Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, SuppressionOutcome::ClickAttributed { sponsor_id: sponsor.id });

    let sponsor = SponsorRepo::find_by_id(&pool, sponsor.id).await.unwrap().unwrap();
    assert_eq!(sponsor.clicks, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn signature_is_checked_when_present(pool: PgPool) {
    let body = r#"{"type": "email.delivered", "data": {"to": ["user1@example.com"]}}"#;
    let engine = SuppressionEngine::new(pool.clone()).with_webhook_secret("whsec");

    let good = compute_webhook_signature("whsec", body.as_bytes());
    assert_eq!(
        engine.handle_payload(body, Some(&good), Utc::now()).await.unwrap(),
        SuppressionOutcome::Ignored
    );
    assert_matches!(
        engine.handle_payload(body, Some("deadbeef"), Utc::now()).await,
        Err(EventsError::InvalidSignature)
    );

    let unconfigured = SuppressionEngine::new(pool.clone());
    assert_matches!(
        unconfigured.handle_payload(body, Some(&good), Utc::now()).await,
        Err(EventsError::Core(CoreError::Configuration(_)))
    );
}
