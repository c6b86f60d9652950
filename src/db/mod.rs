// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer.
//!
//! The sync pipeline talks to storage only through [`Store`]. Firestore
//! backs production; [`MemoryStore`] backs tests and local runs.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use std::future::Future;

use crate::error::Result;
use crate::models::{Credential, Event, NormalizedActivity, Profile, Registration};

/// Collection names as constants.
pub mod collections {
    pub const CREDENTIALS: &str = "credentials";
    /// Global activity store (persisted strategy), keyed by external_id
    pub const ACTIVITIES: &str = "activities";
    /// Event partitions, keyed by `{event_id}_{external_id}`
    pub const EVENT_ACTIVITIES: &str = "event_activities";
    pub const EVENTS: &str = "events";
    /// Keyed by `{event_id}_{user_id}`
    pub const REGISTRATIONS: &str = "registrations";
    pub const PROFILES: &str = "profiles";
}

/// Document ID for an event partition row.
///
/// Unique per `(event_id, external_id)`, so re-syncing overwrites.
pub fn event_activity_doc_id(event_id: &str, external_id: u64) -> String {
    format!("{}_{}", urlencoding::encode(event_id), external_id)
}

/// Document ID for a registration.
pub fn registration_doc_id(event_id: &str, user_id: &str) -> String {
    format!(
        "{}_{}",
        urlencoding::encode(event_id),
        urlencoding::encode(user_id)
    )
}

/// Sort activity rows newest first, ties by external ID.
pub(crate) fn most_recent_first(mut rows: Vec<NormalizedActivity>) -> Vec<NormalizedActivity> {
    rows.sort_by(|a, b| {
        b.start_instant
            .cmp(&a.start_instant)
            .then_with(|| a.external_id.cmp(&b.external_id))
    });
    rows
}

/// Storage operations used by the sync pipeline and leaderboard.
///
/// Upserts replace the whole document: every normalized field is
/// overwritten, nothing is merged.
pub trait Store: Clone + Send + Sync + 'static {
    // ── Credentials ───────────────────────────────────────────────────

    fn get_credential(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<Credential>>> + Send;

    fn set_credential(&self, credential: &Credential) -> impl Future<Output = Result<()>> + Send;

    // ── Global activities ─────────────────────────────────────────────

    fn upsert_activity(
        &self,
        activity: &NormalizedActivity,
    ) -> impl Future<Output = Result<()>> + Send;

    fn get_activities_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<NormalizedActivity>>> + Send;

    // ── Event partitions ──────────────────────────────────────────────

    fn upsert_event_activity(
        &self,
        event_id: &str,
        activity: &NormalizedActivity,
    ) -> impl Future<Output = Result<()>> + Send;

    fn get_event_activities_for_user(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<NormalizedActivity>>> + Send;

    /// Delete every row of an event partition. Returns the number deleted.
    fn delete_event_activities(&self, event_id: &str)
        -> impl Future<Output = Result<usize>> + Send;

    // ── Events & registrations ────────────────────────────────────────

    fn get_event(&self, event_id: &str) -> impl Future<Output = Result<Option<Event>>> + Send;

    fn set_event(&self, event: &Event) -> impl Future<Output = Result<()>> + Send;

    fn get_registrations_for_event(
        &self,
        event_id: &str,
    ) -> impl Future<Output = Result<Vec<Registration>>> + Send;

    fn get_registrations_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<Registration>>> + Send;

    fn get_profile(&self, user_id: &str) -> impl Future<Output = Result<Option<Profile>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_ids_are_composite_and_encoded() {
        assert_eq!(event_activity_doc_id("summer-2024", 42), "summer-2024_42");
        assert_eq!(event_activity_doc_id("a/b", 7), "a%2Fb_7");
        assert_ne!(
            event_activity_doc_id("e1", 42),
            event_activity_doc_id("e2", 42)
        );
        assert_eq!(registration_doc_id("e 1", "u1"), "e%201_u1");
    }

    #[test]
    fn test_most_recent_first() {
        use crate::models::ActivityCategory;
        use chrono::{NaiveDate, TimeZone, Utc};

        let row = |id: u64, hour: u32| NormalizedActivity {
            user_id: "u1".to_string(),
            external_id: id,
            name: String::new(),
            category: ActivityCategory::Run,
            distance_m: 0.0,
            moving_time_s: 0,
            elapsed_time_s: 0,
            elevation_m: 0.0,
            local_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            start_instant: Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap(),
            event_id: None,
        };

        let sorted = most_recent_first(vec![row(1, 8), row(3, 12), row(2, 12), row(4, 10)]);
        let ids: Vec<u64> = sorted.iter().map(|r| r.external_id).collect();
        assert_eq!(ids, vec![2, 3, 4, 1]);
    }
}
