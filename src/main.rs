// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Club-Sync admin job
//!
//! Syncs every paid registrant of one event from Strava, then logs the
//! resulting leaderboard. Intended to run as a scheduled one-shot job.

use club_sync::{config::Config, db::FirestoreDb, models::ActivityTypeFilter, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    let Some(event_id) = config.sync_event_id.clone() else {
        anyhow::bail!("SYNC_EVENT_ID must be set");
    };
    tracing::info!(
        event_id = %event_id,
        strategy = ?config.sync_strategy,
        concurrency = config.sync_concurrency,
        "Starting Club-Sync job"
    );

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;
    let state = AppState::new(config, db);

    let tally = state.activity_source.sync_event_all(&event_id).await?;
    tracing::info!(
        event_id = %event_id,
        total = tally.total,
        synced = tally.synced,
        no_credential = tally.no_credential,
        errored = tally.errored,
        "Sync finished"
    );

    let leaderboard = state
        .leaderboard_service
        .load(&event_id, &ActivityTypeFilter::All)
        .await?;
    for entry in &leaderboard.entries {
        tracing::info!(
            rank = entry.rank,
            user_id = %entry.user_id,
            name = %entry.display_name,
            eligible_days = entry.eligible_day_count(),
            eligible_distance_m = entry.eligible_distance_m,
            total_activities = entry.total_activities,
            "Leaderboard entry"
        );
    }

    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("club_sync=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
