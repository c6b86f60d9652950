// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client and credential management.
//!
//! Handles:
//! - Activity listing with optional time bounds
//! - Normalization into [`NormalizedActivity`]
//! - Authorization-code exchange and token refresh
//! - Rate limit backoff (HTTP 429)

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{ActivityCategory, NormalizedActivity};
use crate::services::backoff::{self, BackoffPolicy};
use crate::time_utils::TimeWindow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
    backoff: BackoffPolicy,
}

/// Parameters for one page of `GET /athlete/activities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityQuery {
    /// Unix seconds, exclusive lower bound
    pub after: Option<i64>,
    /// Unix seconds, exclusive upper bound
    pub before: Option<i64>,
    pub page: u32,
    pub per_page: u32,
}

impl ActivityQuery {
    /// The most recent `per_page` activities, irrespective of date.
    pub fn recent(per_page: u32) -> Self {
        Self {
            after: None,
            before: None,
            page: 1,
            per_page,
        }
    }

    /// Activities inside `window`. The API bounds are advisory; callers
    /// must still filter the results against the window.
    pub fn within(window: &TimeWindow, per_page: u32) -> Self {
        Self {
            after: Some(window.after_unix() - 1),
            before: Some(window.before_unix()),
            page: 1,
            per_page,
        }
    }

    fn to_params(self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
        ];
        if let Some(after) = self.after {
            params.push(("after", after.to_string()));
        }
        if let Some(before) = self.before {
            params.push(("before", before.to_string()));
        }
        params
    }
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: crate::config::DEFAULT_STRAVA_API_BASE.to_string(),
            oauth_base: crate::config::DEFAULT_STRAVA_OAUTH_BASE.to_string(),
            client_id,
            client_secret,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
        )
        .with_base_urls(&config.strava_api_base, &config.strava_oauth_base)
        .with_backoff(BackoffPolicy::new(
            config.rate_limit_max_retries,
            config.rate_limit_initial_backoff,
        ))
    }

    /// Point the client at another host (e.g. a mock server).
    pub fn with_base_urls(mut self, api_base: &str, oauth_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.oauth_base = oauth_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Fetch a single page of activities.
    pub async fn list_activities(
        &self,
        access_token: &str,
        query: ActivityQuery,
    ) -> Result<Vec<StravaActivitySummary>> {
        let url = format!("{}/athlete/activities", self.api_base);
        let params = query.to_params();

        let mut attempt = 0;
        loop {
            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&params)
                .send()
                .await
                .map_err(|e| AppError::FetchFailed {
                    status: 0,
                    message: e.to_string(),
                })?;

            if response.status().as_u16() == 429 {
                if attempt >= self.backoff.max_retries {
                    tracing::warn!(attempts = attempt + 1, "Strava rate limit hit (429), giving up");
                    return Err(AppError::RateLimited);
                }
                let delay = self
                    .backoff
                    .delay_for(attempt, backoff::retry_after(response.headers()));
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Strava rate limit hit (429), backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return check_fetch_json(response).await;
        }
    }

    /// Fetch pages until a short page or `max_pages`.
    pub async fn list_all_activities(
        &self,
        access_token: &str,
        window: Option<&TimeWindow>,
        per_page: u32,
        max_pages: u32,
    ) -> Result<Vec<StravaActivitySummary>> {
        let base = match window {
            Some(w) => ActivityQuery::within(w, per_page),
            None => ActivityQuery::recent(per_page),
        };

        let mut all = Vec::new();
        for page in 1..=max_pages {
            let batch = self
                .list_activities(access_token, ActivityQuery { page, ..base })
                .await?;
            let len = batch.len();
            all.extend(batch);

            if len < per_page as usize {
                return Ok(all);
            }
            if page == max_pages {
                tracing::warn!(
                    max_pages,
                    fetched = all.len(),
                    "Activity page cap reached, older activities not fetched"
                );
            }
        }
        Ok(all)
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// Strava may rotate the refresh token; always store the returned one.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let body = serde_json::json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "refresh_token": refresh_token,
            "grant_type": "refresh_token",
        });
        self.post_token(&body).await
    }

    /// Exchange an authorization code for tokens and the athlete summary.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse> {
        let body = serde_json::json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "code": code,
            "grant_type": "authorization_code",
        });
        self.post_token(&body).await
    }

    /// Revoke the application's access for this user.
    pub async fn deauthorize(&self, access_token: &str) -> Result<()> {
        let url = format!("{}/deauthorize", self.oauth_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                AppError::CredentialRefreshFailed(format!("Deauthorization request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::CredentialRefreshFailed(format!(
                "Deauthorization failed, HTTP {}: {}",
                status, body
            )));
        }

        tracing::info!("Strava deauthorization successful");
        Ok(())
    }

    /// POST to the token endpoint. No retry: the caller decides.
    async fn post_token<T: for<'de> Deserialize<'de>>(&self, body: &serde_json::Value) -> Result<T> {
        let url = format!("{}/token", self.oauth_base);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AppError::CredentialRefreshFailed(format!("Token request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token endpoint rejected request");
            return Err(AppError::CredentialRefreshFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        response.json().await.map_err(|e| {
            AppError::CredentialRefreshFailed(format!("Failed to parse token response: {}", e))
        })
    }
}

/// Check response status and parse the JSON body of an activity fetch.
async fn check_fetch_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::FetchFailed {
            status: status.as_u16(),
            message: body,
        });
    }

    response.json().await.map_err(|e| AppError::FetchFailed {
        status: status.as_u16(),
        message: format!("JSON parse error: {}", e),
    })
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Legacy activity type ("Ride", "Run", ...)
    #[serde(rename = "type", default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub sport_type: Option<String>,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub moving_time: u32,
    #[serde(default)]
    pub elapsed_time: u32,
    #[serde(default)]
    pub total_elevation_gain: f64,
    /// UTC start, e.g. "2024-06-01T14:00:00Z"
    pub start_date: String,
    /// Local wall-clock start; Strava appends a misleading "Z"
    #[serde(default)]
    pub start_date_local: Option<String>,
}

impl StravaActivitySummary {
    pub fn category(&self) -> ActivityCategory {
        let source = self
            .activity_type
            .as_deref()
            .or(self.sport_type.as_deref())
            .unwrap_or_default();
        ActivityCategory::from_source(source)
    }

    pub fn start_instant(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.start_date)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Calendar day in the athlete's local time.
    ///
    /// Taken from the date part of `start_date_local`, falling back to the
    /// UTC date.
    pub fn local_date(&self) -> Option<NaiveDate> {
        self.start_date_local
            .as_deref()
            .and_then(|s| s.get(..10))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .or_else(|| self.start_instant().map(|dt| dt.date_naive()))
    }

    /// Convert to the canonical shape. `None` when `start_date` is unparseable.
    pub fn normalize(&self, user_id: &str) -> Option<NormalizedActivity> {
        let start_instant = self.start_instant()?;
        let local_date = self.local_date()?;

        Some(NormalizedActivity {
            user_id: user_id.to_string(),
            external_id: self.id,
            name: self.name.clone(),
            category: self.category(),
            distance_m: self.distance,
            moving_time_s: self.moving_time,
            elapsed_time_s: self.elapsed_time,
            elevation_m: self.total_elevation_gain,
            local_date,
            start_instant,
            event_id: None,
        })
    }
}

/// Normalize a batch, dropping (and logging) records with bad timestamps.
pub fn normalize_all(user_id: &str, raw: &[StravaActivitySummary]) -> Vec<NormalizedActivity> {
    raw.iter()
        .filter_map(|a| {
            let normalized = a.normalize(user_id);
            if normalized.is_none() {
                tracing::warn!(
                    user_id,
                    activity_id = a.id,
                    start_date = %a.start_date,
                    "Dropping activity with unparseable start date"
                );
            }
            normalized
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - Credential management on top of the client
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::Store;
use crate::models::Credential;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared refresh locks, keyed by user ID.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Strava client plus credential lifecycle.
///
/// This service encapsulates:
/// - Reading credentials from the store
/// - Refresh when within 5 minutes of expiry, persisting the new triple
/// - Per-user locking so concurrent callers never refresh twice
#[derive(Clone)]
pub struct StravaService<S> {
    client: StravaClient,
    store: S,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl<S: Store> StravaService<S> {
    pub fn new(client: StravaClient, store: S) -> Self {
        Self {
            client,
            store,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn client(&self) -> &StravaClient {
        &self.client
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a usable access token for the user, refreshing if needed.
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<String> {
        self.get_valid_access_token_at(user_id, Utc::now()).await
    }

    /// [`Self::get_valid_access_token`] evaluated at `now`.
    pub async fn get_valid_access_token_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let credential = self.load_connected(user_id).await?;
        if !credential.needs_refresh_at(now.timestamp()) {
            return Ok(credential.access_token.unwrap_or_default());
        }

        // Only one task per user performs the refresh; the provider rotates
        // refresh tokens, so a second concurrent refresh would fail.
        let lock = self
            .refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let credential = self.load_connected(user_id).await?;
        if !credential.needs_refresh_at(now.timestamp()) {
            return Ok(credential.access_token.unwrap_or_default());
        }

        tracing::info!(user_id, "Access token expiring, refreshing");

        let refresh_token = credential.refresh_token.clone().unwrap_or_default();
        let new_tokens = self.client.refresh_token(&refresh_token).await?;

        let updated = Credential {
            access_token: Some(new_tokens.access_token.clone()),
            refresh_token: Some(new_tokens.refresh_token),
            expires_at: Some(new_tokens.expires_at),
            updated_at: Some(now),
            ..credential
        };
        self.store.set_credential(&updated).await?;

        tracing::info!(user_id, expires_at = new_tokens.expires_at, "Token refreshed");
        Ok(new_tokens.access_token)
    }

    /// Load a credential that has both tokens, or fail with `NotConnected`.
    async fn load_connected(&self, user_id: &str) -> Result<Credential> {
        let credential = self
            .store
            .get_credential(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;
        if credential.tokens().is_none() {
            return Err(AppError::NotConnected);
        }
        Ok(credential)
    }

    // ─── Connect / Disconnect ────────────────────────────────────────────────

    /// Handle the OAuth callback: exchange the code and store the credential.
    pub async fn connect(&self, user_id: &str, code: &str) -> Result<StravaAthlete> {
        let response = self.client.exchange_code(code).await?;

        let credential = Credential {
            user_id: user_id.to_string(),
            access_token: Some(response.access_token),
            refresh_token: Some(response.refresh_token),
            expires_at: Some(response.expires_at),
            athlete_id: Some(response.athlete.id),
            updated_at: Some(Utc::now()),
        };
        self.store.set_credential(&credential).await?;

        tracing::info!(
            user_id,
            athlete_id = response.athlete.id,
            "Strava account connected"
        );
        Ok(response.athlete)
    }

    /// Null the stored tokens. Deauthorization with Strava is best effort.
    pub async fn disconnect(&self, user_id: &str) -> Result<()> {
        let Some(credential) = self.store.get_credential(user_id).await? else {
            return Ok(());
        };

        if let Some(access_token) = credential.access_token.as_deref() {
            if let Err(e) = self.client.deauthorize(access_token).await {
                tracing::warn!(user_id, error = %e, "Strava deauthorization failed, clearing tokens anyway");
            }
        }

        self.store
            .set_credential(&credential.disconnected(Utc::now()))
            .await?;
        tracing::info!(user_id, "Strava account disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(json: serde_json::Value) -> StravaActivitySummary {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_normalize_full_record() {
        let raw = summary(serde_json::json!({
            "id": 11223344,
            "name": "Evening Ride",
            "type": "Ride",
            "sport_type": "MountainBikeRide",
            "distance": 25123.4,
            "moving_time": 3600,
            "elapsed_time": 4000,
            "total_elevation_gain": 312.0,
            "start_date": "2024-06-02T02:30:00Z",
            "start_date_local": "2024-06-01T19:30:00Z"
        }));

        let n = raw.normalize("user-1").unwrap();
        assert_eq!(n.external_id, 11223344);
        assert_eq!(n.category, ActivityCategory::Cycling);
        assert_eq!(n.distance_m, 25123.4);
        assert_eq!(n.moving_time_s, 3600);
        assert_eq!(n.elapsed_time_s, 4000);
        assert_eq!(n.elevation_m, 312.0);
        // Local date, not the UTC date
        assert_eq!(n.local_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(n.start_instant.to_rfc3339(), "2024-06-02T02:30:00+00:00");
    }

    #[test]
    fn test_normalize_falls_back_to_sport_type_and_utc_date() {
        let raw = summary(serde_json::json!({
            "id": 1,
            "sport_type": "Hike",
            "start_date": "2024-06-02T02:30:00Z"
        }));

        let n = raw.normalize("user-1").unwrap();
        assert_eq!(n.category, ActivityCategory::Hiking);
        assert_eq!(n.local_date, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert_eq!(n.distance_m, 0.0);
    }

    #[test]
    fn test_normalize_rejects_bad_start_date() {
        let raw = summary(serde_json::json!({
            "id": 1,
            "type": "Run",
            "start_date": "yesterday"
        }));
        assert!(raw.normalize("user-1").is_none());
        assert!(normalize_all("user-1", &[raw]).is_empty());
    }

    #[test]
    fn test_query_params() {
        let params = ActivityQuery::recent(200).to_params();
        assert_eq!(
            params,
            vec![("page", "1".to_string()), ("per_page", "200".to_string())]
        );

        let window = TimeWindow::new(
            DateTime::from_timestamp(1_717_200_000, 0).unwrap(),
            DateTime::from_timestamp_millis(1_718_000_000_999).unwrap(),
        );
        let q = ActivityQuery::within(&window, 50);
        assert_eq!(q.after, Some(1_717_199_999));
        assert_eq!(q.before, Some(1_718_000_001));
    }
}
