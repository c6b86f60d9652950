// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Eligibility rules and leaderboard ranking.

use std::cmp::Ordering;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{
    ActivityTypeFilter, Leaderboard, LeaderboardEntry, Participant, Registration,
};
use crate::services::sync::ActivitySource;

/// Score participants and rank them.
///
/// Every activity counts toward the totals. An activity counts toward the
/// eligible stats only if it passes `filter` and meets its category's
/// distance threshold; its `local_date` joins the eligible-day set.
///
/// Order: eligible days desc, eligible distance desc, participants with
/// any activity before those with none, display name (case-insensitive)
/// asc, user ID asc.
pub fn build_leaderboard(
    event_id: &str,
    participants: &[Participant],
    filter: &ActivityTypeFilter,
) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = participants
        .iter()
        .map(|p| score_participant(p, filter))
        .collect();

    entries.sort_by(compare_entries);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i as u32 + 1;
    }

    tracing::debug!(event_id, participants = entries.len(), "Leaderboard built");
    entries
}

fn score_participant(participant: &Participant, filter: &ActivityTypeFilter) -> LeaderboardEntry {
    let mut entry = LeaderboardEntry::new(
        participant.user_id.clone(),
        participant.display_name.clone(),
    );

    for activity in &participant.activities {
        entry.total_activities += 1;
        entry.total_distance_m += activity.distance_m;

        if filter.matches(&activity.category) && activity.meets_threshold() {
            entry.eligible_days.insert(activity.local_date);
            entry.eligible_activities += 1;
            entry.eligible_distance_m += activity.distance_m;
        }
    }
    entry
}

fn compare_entries(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.eligible_day_count()
        .cmp(&a.eligible_day_count())
        .then_with(|| b.eligible_distance_m.total_cmp(&a.eligible_distance_m))
        // Registered but inactive participants always rank last
        .then_with(|| (b.total_activities > 0).cmp(&(a.total_activities > 0)))
        .then_with(|| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
        })
        .then_with(|| a.user_id.cmp(&b.user_id))
}

/// Loads everything a leaderboard needs and ranks it.
#[derive(Clone)]
pub struct LeaderboardService<S> {
    store: S,
    source: ActivitySource<S>,
}

impl<S: Store> LeaderboardService<S> {
    pub fn new(store: S, source: ActivitySource<S>) -> Self {
        Self { store, source }
    }

    /// Build the leaderboard for an event's paid registrants.
    ///
    /// A failed profile or activity read for one user degrades that user's
    /// row (fallback name, no activities) instead of failing the render.
    pub async fn load(&self, event_id: &str, filter: &ActivityTypeFilter) -> Result<Leaderboard> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {}", event_id)))?;

        let registrations: Vec<Registration> = self
            .store
            .get_registrations_for_event(event_id)
            .await?
            .into_iter()
            .filter(Registration::is_paid)
            .collect();

        let mut participants = Vec::with_capacity(registrations.len());
        for registration in &registrations {
            let display_name = self.display_name(registration).await;
            let activities = match self
                .source
                .activities_for_event(&event, &registration.user_id)
                .await
            {
                Ok(activities) => activities,
                Err(e) => {
                    tracing::warn!(
                        user_id = %registration.user_id,
                        event_id,
                        error = %e,
                        "Failed to load activities, showing empty row"
                    );
                    Vec::new()
                }
            };

            participants.push(Participant {
                user_id: registration.user_id.clone(),
                display_name,
                activities,
            });
        }

        let entries = build_leaderboard(event_id, &participants, filter);
        Ok(Leaderboard {
            event_id: event.id,
            event_name: event.name,
            activity_type: match filter {
                ActivityTypeFilter::All => "all".to_string(),
                ActivityTypeFilter::Only(category) => category.as_str().to_string(),
            },
            entries,
        })
    }

    /// Profile name, then registration email, then user ID.
    async fn display_name(&self, registration: &Registration) -> String {
        let profile_name = match self.store.get_profile(&registration.user_id).await {
            Ok(profile) => profile.and_then(|p| p.leaderboard_name().map(str::to_string)),
            Err(e) => {
                tracing::warn!(user_id = %registration.user_id, error = %e, "Profile lookup failed");
                None
            }
        };

        profile_name
            .or_else(|| registration.email.clone())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| registration.user_id.clone())
    }
}
