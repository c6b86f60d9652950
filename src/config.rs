// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! The sync strategy is chosen here, once per deployment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Strava caps `per_page` at 200.
pub const MAX_PAGE_SIZE: u32 = 200;

pub const DEFAULT_STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
pub const DEFAULT_STRAVA_OAUTH_BASE: &str = "https://www.strava.com/oauth";

/// Which activity source backs the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Upsert into the global `activities` collection.
    Persisted,
    /// Fetch per request with the short-lived cache in front.
    OnDemand,
    /// Upsert into the event-scoped `event_activities` partition.
    EventTable,
}

impl FromStr for SyncStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persisted" => Ok(Self::Persisted),
            "on-demand" | "on_demand" | "ondemand" => Ok(Self::OnDemand),
            "event-table" | "event_table" => Ok(Self::EventTable),
            other => Err(ConfigError::Invalid("SYNC_STRATEGY", other.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Base URL of the Strava REST API
    pub strava_api_base: String,
    /// Base URL of the Strava OAuth endpoints
    pub strava_oauth_base: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,

    pub sync_strategy: SyncStrategy,
    /// `per_page` for activity list calls
    pub activity_page_size: u32,
    /// Upper bound on pages fetched by a windowed sync
    pub activity_max_pages: u32,
    /// Number of users synced concurrently by batch operations (1 = serial)
    pub sync_concurrency: usize,

    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_prefix: String,

    /// Retries after an HTTP 429 before giving up
    pub rate_limit_max_retries: u32,
    /// First backoff delay after an HTTP 429
    pub rate_limit_initial_backoff: Duration,

    /// Event synced by the admin job binary
    pub sync_event_id: Option<String>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_api_base: DEFAULT_STRAVA_API_BASE.to_string(),
            strava_oauth_base: DEFAULT_STRAVA_OAUTH_BASE.to_string(),
            gcp_project_id: "test-project".to_string(),
            sync_strategy: SyncStrategy::EventTable,
            activity_page_size: MAX_PAGE_SIZE,
            activity_max_pages: 10,
            sync_concurrency: 1,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(300),
            cache_prefix: "strava_activities_".to_string(),
            rate_limit_max_retries: 3,
            rate_limit_initial_backoff: Duration::from_secs(1),
            sync_event_id: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            strava_api_base: env::var("STRAVA_API_BASE")
                .unwrap_or_else(|_| DEFAULT_STRAVA_API_BASE.to_string()),
            strava_oauth_base: env::var("STRAVA_OAUTH_BASE")
                .unwrap_or_else(|_| DEFAULT_STRAVA_OAUTH_BASE.to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),

            sync_strategy: match env::var("SYNC_STRATEGY") {
                Ok(v) => v.parse()?,
                Err(_) => defaults.sync_strategy,
            },
            activity_page_size: parse_or("ACTIVITY_PAGE_SIZE", defaults.activity_page_size)?
                .clamp(1, MAX_PAGE_SIZE),
            activity_max_pages: parse_or("ACTIVITY_MAX_PAGES", defaults.activity_max_pages)?
                .max(1),
            sync_concurrency: parse_or("SYNC_CONCURRENCY", defaults.sync_concurrency)?.max(1),

            cache_enabled: parse_or("CACHE_ENABLED", defaults.cache_enabled)?,
            cache_ttl: Duration::from_secs(parse_or("CACHE_TTL_SECS", 300u64)?),
            cache_prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.cache_prefix),

            rate_limit_max_retries: parse_or(
                "RATE_LIMIT_MAX_RETRIES",
                defaults.rate_limit_max_retries,
            )?,
            rate_limit_initial_backoff: defaults.rate_limit_initial_backoff,

            sync_event_id: env::var("SYNC_EVENT_ID").ok().filter(|v| !v.is_empty()),
        })
    }
}

/// Parse an optional environment variable, falling back to `default` when unset.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
