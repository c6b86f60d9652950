// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Utc};
use club_sync::config::{Config, SyncStrategy};
use club_sync::db::{FirestoreDb, MemoryStore, Store};
use club_sync::models::{Credential, Event, PaymentStatus, Registration};
use club_sync::services::{BackoffPolicy, StravaClient};
use club_sync::AppState;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Test config pointed at a mock Strava server.
#[allow(dead_code)]
pub fn test_config(server: &MockServer, strategy: SyncStrategy) -> Config {
    Config {
        strava_api_base: server.uri(),
        strava_oauth_base: format!("{}/oauth", server.uri()),
        sync_strategy: strategy,
        ..Config::default()
    }
}

/// Strava client for a mock server that fails on the first 429.
#[allow(dead_code)]
pub fn test_client(server: &MockServer) -> StravaClient {
    StravaClient::new("test_client_id".to_string(), "test_secret".to_string())
        .with_base_urls(&server.uri(), &format!("{}/oauth", server.uri()))
        .with_backoff(BackoffPolicy::none())
}

/// Wire application state over an in-memory store and a mock server.
#[allow(dead_code)]
pub fn create_test_app(server: &MockServer, strategy: SyncStrategy) -> AppState<MemoryStore> {
    let config = test_config(server, strategy);
    AppState::with_client(test_client(server), config, MemoryStore::new())
}

#[allow(dead_code)]
pub fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC3339")
        .with_timezone(&Utc)
}

/// A credential valid for `ttl_secs` from now.
#[allow(dead_code)]
pub fn credential(user_id: &str, access_token: &str, ttl_secs: i64) -> Credential {
    Credential {
        user_id: user_id.to_string(),
        access_token: Some(access_token.to_string()),
        refresh_token: Some(format!("refresh-{}", user_id)),
        expires_at: Some(Utc::now().timestamp() + ttl_secs),
        athlete_id: Some(42),
        updated_at: None,
    }
}

#[allow(dead_code)]
pub fn event(id: &str, start_date: &str, end_date: Option<&str>) -> Event {
    Event {
        id: id.to_string(),
        name: format!("Event {}", id),
        start_date: start_date.to_string(),
        end_date: end_date.map(str::to_string),
        active: true,
        activities_provisioned: false,
        partition_id: None,
    }
}

#[allow(dead_code)]
pub fn registration(event_id: &str, user_id: &str, status: PaymentStatus) -> Registration {
    Registration {
        event_id: event_id.to_string(),
        user_id: user_id.to_string(),
        payment_status: status,
        email: Some(format!("{}@example.com", user_id)),
        created_at: None,
    }
}

/// Store a credential for each user, all valid for an hour.
#[allow(dead_code)]
pub async fn connect_users(store: &MemoryStore, users: &[&str]) {
    for user in users {
        store
            .set_credential(&credential(user, &format!("token-{}", user), 3600))
            .await
            .expect("set credential");
    }
}

/// Raw Strava activity JSON.
#[allow(dead_code)]
pub fn strava_activity(
    id: u64,
    sport: &str,
    distance: f64,
    start_date: &str,
    start_date_local: &str,
) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("{} {}", sport, id),
        "type": sport,
        "sport_type": sport,
        "distance": distance,
        "moving_time": 1800,
        "elapsed_time": 1900,
        "total_elevation_gain": 10.0,
        "start_date": start_date,
        "start_date_local": start_date_local,
    })
}

/// Serve `activities` for every activity list call.
#[allow(dead_code)]
pub async fn mount_activities(server: &MockServer, activities: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/athlete/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(activities))
        .mount(server)
        .await;
}
