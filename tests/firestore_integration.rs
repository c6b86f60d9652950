// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST`). Without it they are skipped.

use chrono::{NaiveDate, Utc};
use club_sync::db::{FirestoreDb, Store};
use club_sync::error::AppError;
use club_sync::models::{ActivityCategory, NormalizedActivity, PaymentStatus, Profile};

mod common;
use common::{credential, event, parse_time, registration, test_db};

/// Unique suffix for test isolation.
fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

fn unique_external_id() -> u64 {
    Utc::now().timestamp_micros() as u64
}

fn activity(user_id: &str, external_id: u64, name: &str, start: &str) -> NormalizedActivity {
    let start_instant = parse_time(start);
    NormalizedActivity {
        user_id: user_id.to_string(),
        external_id,
        name: name.to_string(),
        category: ActivityCategory::Walk,
        distance_m: 4000.0,
        moving_time_s: 2400,
        elapsed_time_s: 2500,
        elevation_m: 5.0,
        local_date: start_instant.date_naive(),
        start_instant,
        event_id: None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// OFFLINE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_offline_db_reports_persistence_failure() {
    let db = FirestoreDb::new_mock();
    let err = db.get_credential("u1").await.unwrap_err();
    assert!(matches!(err, AppError::PersistenceFailed(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// CREDENTIALS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_credential_roundtrip_and_disconnect() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");

    assert!(db.get_credential(&user_id).await.unwrap().is_none());

    let cred = credential(&user_id, "access", 3600);
    db.set_credential(&cred).await.unwrap();
    let fetched = db.get_credential(&user_id).await.unwrap().unwrap();
    assert_eq!(fetched.access_token.as_deref(), Some("access"));
    assert_eq!(fetched.expires_at, cred.expires_at);

    db.set_credential(&fetched.disconnected(Utc::now())).await.unwrap();
    let cleared = db.get_credential(&user_id).await.unwrap().unwrap();
    assert!(cleared.tokens().is_none());
    assert_eq!(cleared.athlete_id, Some(42));
}

// ═══════════════════════════════════════════════════════════════════════════
// ACTIVITIES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_activity_upsert_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let id = unique_external_id();

    db.upsert_activity(&activity(&user_id, id, "Morning Walk", "2024-06-03T15:00:00Z"))
        .await
        .unwrap();
    db.upsert_activity(&activity(&user_id, id, "Renamed Walk", "2024-06-03T15:00:00Z"))
        .await
        .unwrap();
    db.upsert_activity(&activity(&user_id, id + 1, "Later Walk", "2024-06-04T15:00:00Z"))
        .await
        .unwrap();

    let rows = db.get_activities_for_user(&user_id).await.unwrap();
    assert_eq!(rows.len(), 2);
    // Most recent first
    assert_eq!(rows[0].name, "Later Walk");
    assert_eq!(rows[1].name, "Renamed Walk");
    assert_eq!(rows[1].local_date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
}

#[tokio::test]
async fn test_event_activity_partition_lifecycle() {
    require_emulator!();

    let db = test_db().await;
    let event_id = unique_id("event");
    let user_id = unique_id("user");
    let id = unique_external_id();

    let a = activity(&user_id, id, "Walk", "2024-06-03T15:00:00Z");
    db.upsert_event_activity(&event_id, &a).await.unwrap();
    db.upsert_event_activity(&event_id, &a).await.unwrap();
    db.upsert_event_activity(&event_id, &activity(&user_id, id + 1, "Walk 2", "2024-06-05T15:00:00Z"))
        .await
        .unwrap();

    let rows = db
        .get_event_activities_for_user(&event_id, &user_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.event_id.as_deref() == Some(event_id.as_str())));

    assert_eq!(db.delete_event_activities(&event_id).await.unwrap(), 2);
    assert!(db
        .get_event_activities_for_user(&event_id, &user_id)
        .await
        .unwrap()
        .is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// EVENTS, REGISTRATIONS, PROFILES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_event_registration_profile_reads() {
    require_emulator!();

    let db = test_db().await;
    let event_id = unique_id("event");
    let user_id = unique_id("user");

    let e = event(&event_id, "2024-06-01", Some("2024-06-21"));
    db.set_event(&e).await.unwrap();
    assert_eq!(db.get_event(&event_id).await.unwrap(), Some(e));

    db.set_registration(&registration(&event_id, &user_id, PaymentStatus::Paid))
        .await
        .unwrap();
    let for_event = db.get_registrations_for_event(&event_id).await.unwrap();
    assert_eq!(for_event.len(), 1);
    assert!(for_event[0].is_paid());
    let for_user = db.get_registrations_for_user(&user_id).await.unwrap();
    assert_eq!(for_user[0].event_id, event_id);

    db.upsert_profile(&Profile {
        user_id: user_id.clone(),
        email: Some("p@example.com".to_string()),
        display_name: None,
    })
    .await
    .unwrap();
    let profile = db.get_profile(&user_id).await.unwrap().unwrap();
    assert_eq!(profile.leaderboard_name(), Some("p@example.com"));
}
