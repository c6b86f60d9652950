// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity synchronization.
//!
//! One [`ActivitySource`] per deployment, configured with a
//! [`SyncStrategy`]:
//! - `Persisted`: upsert into the global `activities` collection
//! - `OnDemand`: fetch through the short-lived cache, no durable write
//! - `EventTable`: upsert into the event's partition of `event_activities`
//!
//! Credential handling, fetching and normalization are shared by all three.

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;

use crate::config::{Config, SyncStrategy};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{Event, NormalizedActivity};
use crate::services::cache::{ActivityCache, QueryShape};
use crate::services::strava::{normalize_all, ActivityQuery, StravaService};
use crate::time_utils::TimeWindow;

/// Outcome of syncing one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records returned by Strava
    pub fetched: u32,
    /// Records written (or, on demand, returned)
    pub synced: u32,
    /// Records that failed to normalize or upsert
    pub skipped: u32,
    /// Records dropped by the exact window filter
    pub out_of_window: u32,
}

/// Outcome of syncing many users or events. Never raised as an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSyncTally {
    pub total: u32,
    pub synced: u32,
    pub no_credential: u32,
    pub errored: u32,
}

impl BatchSyncTally {
    fn record(&mut self, outcome: &Result<SyncReport>) {
        match outcome {
            Ok(_) => self.synced += 1,
            Err(AppError::NotConnected) => self.no_credential += 1,
            Err(_) => self.errored += 1,
        }
    }
}

/// Fetches, normalizes and stores activities per the configured strategy.
#[derive(Clone)]
pub struct ActivitySource<S> {
    strategy: SyncStrategy,
    strava: StravaService<S>,
    store: S,
    cache: Option<ActivityCache>,
    page_size: u32,
    max_pages: u32,
    concurrency: usize,
}

impl<S: Store> ActivitySource<S> {
    pub fn new(
        config: &Config,
        strava: StravaService<S>,
        store: S,
        cache: Option<ActivityCache>,
    ) -> Self {
        Self {
            strategy: config.sync_strategy,
            strava,
            store,
            cache,
            page_size: config.activity_page_size,
            max_pages: config.activity_max_pages,
            concurrency: config.sync_concurrency.max(1),
        }
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    pub fn strava(&self) -> &StravaService<S> {
        &self.strava
    }

    pub fn cache(&self) -> Option<&ActivityCache> {
        self.cache.as_ref()
    }

    // ─── Shared fetch path ───────────────────────────────────────────────────

    /// Resolve a token and fetch raw activities, normalized.
    ///
    /// With a window, pages through everything inside it; without one,
    /// fetches a single page of the most recent activities.
    async fn fetch_normalized(
        &self,
        user_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<(u32, Vec<NormalizedActivity>)> {
        let token = self.strava.get_valid_access_token(user_id).await?;
        let raw = match window {
            Some(w) => {
                self.strava
                    .client()
                    .list_all_activities(&token, Some(w), self.page_size, self.max_pages)
                    .await?
            }
            None => {
                self.strava
                    .client()
                    .list_activities(&token, ActivityQuery::recent(self.page_size))
                    .await?
            }
        };

        tracing::debug!(user_id, fetched = raw.len(), "Fetched activities from Strava");
        Ok((raw.len() as u32, normalize_all(user_id, &raw)))
    }

    // ─── Persisted strategy ──────────────────────────────────────────────────

    /// Fetch and upsert into the global store keyed by `external_id`.
    ///
    /// A per-activity upsert failure counts as skipped and does not abort
    /// the batch.
    pub async fn sync_persisted(
        &self,
        user_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<SyncReport> {
        let (fetched, activities) = self.fetch_normalized(user_id, window).await?;
        let mut report = SyncReport {
            fetched,
            skipped: fetched - activities.len() as u32,
            ..Default::default()
        };

        for activity in &activities {
            if window.is_some_and(|w| !w.contains(activity.start_instant)) {
                report.out_of_window += 1;
                continue;
            }
            match self.store.upsert_activity(activity).await {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        activity_id = activity.external_id,
                        error = %e,
                        "Activity upsert failed, skipping"
                    );
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(user_id, ?report, "Persisted sync complete");
        Ok(report)
    }

    // ─── On-demand strategy ──────────────────────────────────────────────────

    /// Cached fetch with write-through. `force_refresh` bypasses the read.
    pub async fn fetch_on_demand(
        &self,
        user_id: &str,
        shape: QueryShape,
        force_refresh: bool,
    ) -> Result<Vec<NormalizedActivity>> {
        if !force_refresh {
            if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(user_id, &shape)) {
                return Ok(hit);
            }
        }

        let activities = match shape {
            QueryShape::Recent => self.fetch_normalized(user_id, None).await?.1,
            QueryShape::Range { after, before } => {
                let window = range_window(after, before, Utc::now())?;
                let (_, activities) = self.fetch_normalized(user_id, Some(&window)).await?;
                activities
                    .into_iter()
                    .filter(|a| window.contains(a.start_instant))
                    .collect()
            }
        };

        if let Some(cache) = &self.cache {
            cache.set(user_id, &shape, &activities);
        }
        Ok(activities)
    }

    /// Dashboard view: the latest page of activities.
    pub async fn recent_activities(
        &self,
        user_id: &str,
        force_refresh: bool,
    ) -> Result<Vec<NormalizedActivity>> {
        self.fetch_on_demand(user_id, QueryShape::Recent, force_refresh)
            .await
    }

    // ─── Event-table strategy ────────────────────────────────────────────────

    /// Provision the event's activity partition if the event has started.
    ///
    /// Returns the partition ID, or `None` before the event's first day.
    pub async fn ensure_event_partition(
        &self,
        event: &Event,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        if event.activities_provisioned {
            if let Some(id) = &event.partition_id {
                return Ok(Some(id.clone()));
            }
        }
        if !event.has_started_at(now) {
            tracing::debug!(event_id = %event.id, "Event not started, partition not provisioned");
            return Ok(None);
        }

        // Write only the partition fields over the stored document.
        let stored = self
            .store
            .get_event(&event.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {}", event.id)))?;
        if stored.activities_provisioned {
            if let Some(id) = stored.partition_id {
                return Ok(Some(id));
            }
        }

        let provisioned = Event {
            activities_provisioned: true,
            partition_id: Some(stored.id.clone()),
            ..stored
        };
        self.store.set_event(&provisioned).await?;

        tracing::info!(event_id = %event.id, "Event activity partition provisioned");
        Ok(provisioned.partition_id)
    }

    /// Delete an event's partition rows and clear its provisioned flag.
    ///
    /// Returns `false` if the event does not exist.
    pub async fn drop_event_partition(&self, event_id: &str) -> Result<bool> {
        let Some(event) = self.store.get_event(event_id).await? else {
            return Ok(false);
        };

        let deleted = self.store.delete_event_activities(event_id).await?;
        self.store
            .set_event(&Event {
                activities_provisioned: false,
                partition_id: None,
                ..event
            })
            .await?;

        tracing::info!(event_id, deleted, "Event activity partition dropped");
        Ok(true)
    }

    /// Sync one user's activities into an event partition.
    pub async fn sync_event(&self, event: &Event, user_id: &str) -> Result<SyncReport> {
        let now = Utc::now();
        let Some(partition) = self.ensure_event_partition(event, now).await? else {
            return Ok(SyncReport::default());
        };
        let window = event_window(event, now)?;

        let (fetched, activities) = self.fetch_normalized(user_id, Some(&window)).await?;
        let mut report = SyncReport {
            fetched,
            skipped: fetched - activities.len() as u32,
            ..Default::default()
        };

        for activity in &activities {
            // The API's after/before are advisory
            if !window.contains(activity.start_instant) {
                report.out_of_window += 1;
                continue;
            }
            match self.store.upsert_event_activity(&partition, activity).await {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        event_id = %partition,
                        activity_id = activity.external_id,
                        error = %e,
                        "Event activity upsert failed, skipping"
                    );
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(user_id, event_id = %partition, ?report, "Event sync complete");
        Ok(report)
    }

    // ─── Strategy dispatch ───────────────────────────────────────────────────

    /// Sync one user for one event with the configured strategy.
    pub async fn sync_user_for_event(&self, event: &Event, user_id: &str) -> Result<SyncReport> {
        match self.strategy {
            SyncStrategy::Persisted => {
                let window = event_window(event, Utc::now())?;
                self.sync_persisted(user_id, Some(&window)).await
            }
            SyncStrategy::OnDemand => {
                let window = event_window(event, Utc::now())?;
                let shape = QueryShape::for_window(&window, event.is_open_ended());
                let activities = self.fetch_on_demand(user_id, shape, true).await?;
                Ok(SyncReport {
                    fetched: activities.len() as u32,
                    synced: activities.len() as u32,
                    ..Default::default()
                })
            }
            SyncStrategy::EventTable => self.sync_event(event, user_id).await,
        }
    }

    /// A user's activities inside the event window, from wherever the
    /// configured strategy keeps them.
    pub async fn activities_for_event(
        &self,
        event: &Event,
        user_id: &str,
    ) -> Result<Vec<NormalizedActivity>> {
        let window = event_window(event, Utc::now())?;
        let activities = match self.strategy {
            SyncStrategy::Persisted => self.store.get_activities_for_user(user_id).await?,
            SyncStrategy::OnDemand => {
                let shape = QueryShape::for_window(&window, event.is_open_ended());
                self.fetch_on_demand(user_id, shape, false).await?
            }
            SyncStrategy::EventTable => {
                let partition = event.partition_id.as_deref().unwrap_or(&event.id);
                self.store
                    .get_event_activities_for_user(partition, user_id)
                    .await?
            }
        };

        Ok(activities
            .into_iter()
            .filter(|a| window.contains(a.start_instant))
            .collect())
    }

    // ─── Batch operations ────────────────────────────────────────────────────

    /// Sync every paid registrant of an event.
    ///
    /// Per-user failures are tallied and never stop the batch.
    pub async fn sync_event_all(&self, event_id: &str) -> Result<BatchSyncTally> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {}", event_id)))?;

        let user_ids: Vec<String> = self
            .store
            .get_registrations_for_event(event_id)
            .await?
            .into_iter()
            .filter(|r| r.is_paid())
            .map(|r| r.user_id)
            .collect();

        tracing::info!(
            event_id,
            registrants = user_ids.len(),
            strategy = ?self.strategy,
            "Syncing all registrants"
        );

        let now = Utc::now();
        if !event.has_started_at(now) {
            // Nothing to sync yet; no user is attempted.
            let tally = BatchSyncTally {
                total: user_ids.len() as u32,
                ..Default::default()
            };
            tracing::info!(event_id, ?tally, "Event not started, batch sync skipped");
            return Ok(tally);
        }

        // Provision once up front instead of racing per user.
        let event = if self.strategy == SyncStrategy::EventTable {
            match self.ensure_event_partition(&event, now).await? {
                Some(partition) => Event {
                    activities_provisioned: true,
                    partition_id: Some(partition),
                    ..event
                },
                None => event,
            }
        } else {
            event
        };

        let event = &event;
        let outcomes: Vec<(String, Result<SyncReport>)> = stream::iter(user_ids)
            .map(|user_id| async move {
                let outcome = self.sync_user_for_event(event, &user_id).await;
                (user_id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut tally = BatchSyncTally::default();
        for (user_id, outcome) in &outcomes {
            tally.total += 1;
            tally.record(outcome);
            match outcome {
                Err(AppError::NotConnected) => {
                    tracing::info!(user_id = %user_id, event_id, "No Strava credential, skipping")
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, event_id, error = %e, "User sync failed")
                }
                Ok(_) => {}
            }
        }

        tracing::info!(event_id, ?tally, "Batch sync complete");
        Ok(tally)
    }

    /// Sync a user into every active, started event they paid for.
    ///
    /// Used on login. Per-event failures are tallied.
    pub async fn sync_user_active_events(&self, user_id: &str) -> Result<BatchSyncTally> {
        let now = Utc::now();
        let registrations = self.store.get_registrations_for_user(user_id).await?;

        let mut tally = BatchSyncTally::default();
        for registration in registrations.iter().filter(|r| r.is_paid()) {
            let event = match self.store.get_event(&registration.event_id).await {
                Ok(Some(event)) if event.active && event.has_started_at(now) => event,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(user_id, event_id = %registration.event_id, error = %e, "Failed to load event");
                    tally.total += 1;
                    tally.errored += 1;
                    continue;
                }
            };

            tally.total += 1;
            let outcome = self.sync_user_for_event(&event, user_id).await;
            if let Err(e) = &outcome {
                tracing::warn!(user_id, event_id = %event.id, error = %e, "Auto-sync failed for event");
            }
            tally.record(&outcome);
        }

        tracing::info!(user_id, ?tally, "Auto-sync complete");
        Ok(tally)
    }
}

fn event_window(event: &Event, now: DateTime<Utc>) -> Result<TimeWindow> {
    event.window_at(now).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Event {} has an invalid start date {:?}",
            event.id, event.start_date
        ))
    })
}

fn range_window(after: i64, before: Option<i64>, now: DateTime<Utc>) -> Result<TimeWindow> {
    let to_instant = |secs: i64| {
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| AppError::BadRequest(format!("Timestamp out of range: {}", secs)))
    };
    let before = match before {
        Some(secs) => to_instant(secs)?,
        None => now,
    };
    Ok(TimeWindow::new(to_instant(after)?, before))
}
