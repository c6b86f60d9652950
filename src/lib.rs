// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Club-Sync: Strava activity sync and event leaderboards for a fitness club
//!
//! This crate keeps members' Strava activities in sync (persisted, on
//! demand, or per event) and ranks event participants by distinct days
//! with an eligible activity.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{ActivityCache, ActivitySource, LeaderboardService, StravaClient, StravaService};

/// Shared application state, wired once from configuration.
#[derive(Clone)]
pub struct AppState<S> {
    pub config: Config,
    pub store: S,
    pub strava_service: StravaService<S>,
    pub activity_source: ActivitySource<S>,
    pub leaderboard_service: LeaderboardService<S>,
}

impl<S: Store> AppState<S> {
    pub fn new(config: Config, store: S) -> Self {
        Self::with_client(StravaClient::from_config(&config), config, store)
    }

    /// Wire state around an explicit client (tests point it at a mock server).
    pub fn with_client(client: StravaClient, config: Config, store: S) -> Self {
        let strava_service = StravaService::new(client, store.clone());
        let activity_source = ActivitySource::new(
            &config,
            strava_service.clone(),
            store.clone(),
            ActivityCache::from_config(&config),
        );
        let leaderboard_service = LeaderboardService::new(store.clone(), activity_source.clone());

        Self {
            config,
            store,
            strava_service,
            activity_source,
            leaderboard_service,
        }
    }
}
