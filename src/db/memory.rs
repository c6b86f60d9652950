// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory [`Store`] for tests and local runs.

use dashmap::{DashMap, DashSet};
use std::sync::Arc;

use crate::db::{event_activity_doc_id, most_recent_first, registration_doc_id, Store};
use crate::error::{AppError, Result};
use crate::models::{Credential, Event, NormalizedActivity, Profile, Registration};

#[derive(Default)]
struct Tables {
    credentials: DashMap<String, Credential>,
    activities: DashMap<u64, NormalizedActivity>,
    event_activities: DashMap<String, NormalizedActivity>,
    events: DashMap<String, Event>,
    registrations: DashMap<String, Registration>,
    profiles: DashMap<String, Profile>,
    /// External IDs whose upserts are refused.
    rejected_ids: DashSet<u64>,
}

/// Shared, cloneable in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse upserts of these activities, the way row-level
    /// authorization would.
    pub fn reject_upserts(&self, external_ids: impl IntoIterator<Item = u64>) {
        self.tables.rejected_ids.clear();
        for id in external_ids {
            self.tables.rejected_ids.insert(id);
        }
    }

    pub fn set_registration(&self, registration: Registration) {
        let key = registration_doc_id(&registration.event_id, &registration.user_id);
        self.tables.registrations.insert(key, registration);
    }

    pub fn upsert_profile(&self, profile: Profile) {
        self.tables.profiles.insert(profile.user_id.clone(), profile);
    }

    /// Number of rows in the global activity store.
    pub fn activity_count(&self) -> usize {
        self.tables.activities.len()
    }

    /// Number of rows across all event partitions.
    pub fn event_activity_count(&self) -> usize {
        self.tables.event_activities.len()
    }

    fn check_upsert_allowed(&self, external_id: u64) -> Result<()> {
        if self.tables.rejected_ids.contains(&external_id) {
            return Err(AppError::PersistenceFailed(format!(
                "Upsert of activity {} rejected",
                external_id
            )));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    async fn get_credential(&self, user_id: &str) -> Result<Option<Credential>> {
        Ok(self
            .tables
            .credentials
            .get(user_id)
            .map(|c| c.value().clone()))
    }

    async fn set_credential(&self, credential: &Credential) -> Result<()> {
        self.tables
            .credentials
            .insert(credential.user_id.clone(), credential.clone());
        Ok(())
    }

    async fn upsert_activity(&self, activity: &NormalizedActivity) -> Result<()> {
        self.check_upsert_allowed(activity.external_id)?;
        self.tables
            .activities
            .insert(activity.external_id, activity.clone());
        Ok(())
    }

    async fn get_activities_for_user(&self, user_id: &str) -> Result<Vec<NormalizedActivity>> {
        let rows = self
            .tables
            .activities
            .iter()
            .filter(|row| row.user_id == user_id)
            .map(|row| row.value().clone())
            .collect();
        Ok(most_recent_first(rows))
    }

    async fn upsert_event_activity(
        &self,
        event_id: &str,
        activity: &NormalizedActivity,
    ) -> Result<()> {
        self.check_upsert_allowed(activity.external_id)?;
        let record = NormalizedActivity {
            event_id: Some(event_id.to_string()),
            ..activity.clone()
        };
        self.tables
            .event_activities
            .insert(event_activity_doc_id(event_id, activity.external_id), record);
        Ok(())
    }

    async fn get_event_activities_for_user(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Vec<NormalizedActivity>> {
        let rows = self
            .tables
            .event_activities
            .iter()
            .filter(|row| row.event_id.as_deref() == Some(event_id) && row.user_id == user_id)
            .map(|row| row.value().clone())
            .collect();
        Ok(most_recent_first(rows))
    }

    async fn delete_event_activities(&self, event_id: &str) -> Result<usize> {
        let before = self.tables.event_activities.len();
        self.tables
            .event_activities
            .retain(|_, row| row.event_id.as_deref() != Some(event_id));
        Ok(before - self.tables.event_activities.len())
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
        Ok(self.tables.events.get(event_id).map(|e| e.value().clone()))
    }

    async fn set_event(&self, event: &Event) -> Result<()> {
        self.tables.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn get_registrations_for_event(&self, event_id: &str) -> Result<Vec<Registration>> {
        let mut rows: Vec<Registration> = self
            .tables
            .registrations
            .iter()
            .filter(|r| r.event_id == event_id)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(rows)
    }

    async fn get_registrations_for_user(&self, user_id: &str) -> Result<Vec<Registration>> {
        let mut rows: Vec<Registration> = self
            .tables
            .registrations
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        Ok(rows)
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self.tables.profiles.get(user_id).map(|p| p.value().clone()))
    }
}
