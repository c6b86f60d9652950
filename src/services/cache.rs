// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Short-lived activity cache for the on-demand strategy.
//!
//! Keys are `{prefix}{user}` for the recency query and
//! `{prefix}{user}_{after}_{before}` for range queries. Values are JSON
//! `{activities, timestamp}` with the write time in milliseconds.
//!
//! This is an optimization only; every caller works with an empty cache.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::models::NormalizedActivity;
use crate::time_utils::TimeWindow;

/// Upper bound label for open-ended ranges.
const OPEN_END: &str = "now";

/// What a cached result answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// Most recent page, no date bounds
    Recent,
    /// Bounded range in Unix seconds; `before = None` means "until now"
    Range { after: i64, before: Option<i64> },
}

impl QueryShape {
    /// Shape for an event window. Open-ended events share one key.
    pub fn for_window(window: &TimeWindow, open_ended: bool) -> Self {
        Self::Range {
            after: window.after_unix(),
            before: (!open_ended).then(|| window.before_unix()),
        }
    }

    fn suffix(&self) -> Option<String> {
        match self {
            Self::Recent => None,
            Self::Range { after, before } => Some(match before {
                Some(before) => format!("_{}_{}", after, before),
                None => format!("_{}_{}", after, OPEN_END),
            }),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    activities: Vec<NormalizedActivity>,
    /// Write time, Unix milliseconds
    timestamp: i64,
}

/// Session-scoped activity cache with a fixed TTL.
#[derive(Clone)]
pub struct ActivityCache {
    entries: Arc<DashMap<String, String>>,
    prefix: String,
    ttl: Duration,
}

impl ActivityCache {
    pub fn new(prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            prefix: prefix.into(),
            ttl,
        }
    }

    /// `None` when caching is disabled.
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .cache_enabled
            .then(|| Self::new(config.cache_prefix.clone(), config.cache_ttl))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key(&self, user_id: &str, shape: &QueryShape) -> String {
        let mut key = format!("{}{}", self.prefix, user_id);
        if let Some(suffix) = shape.suffix() {
            key.push_str(&suffix);
        }
        key
    }

    pub fn get(&self, user_id: &str, shape: &QueryShape) -> Option<Vec<NormalizedActivity>> {
        self.get_at(user_id, shape, Utc::now())
    }

    /// Read at `now`. Expired or corrupt entries are evicted.
    pub fn get_at(
        &self,
        user_id: &str,
        shape: &QueryShape,
        now: DateTime<Utc>,
    ) -> Option<Vec<NormalizedActivity>> {
        let key = self.key(user_id, shape);
        // Clone out so the shard lock is released before any removal.
        let raw = self.entries.get(&key).map(|v| v.value().clone())?;

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Dropping unreadable cache entry");
                self.entries.remove(&key);
                return None;
            }
        };

        let age_ms = now.timestamp_millis() - entry.timestamp;
        if age_ms >= self.ttl.as_millis() as i64 {
            tracing::debug!(key = %key, age_ms, "Cache entry expired");
            self.entries.remove(&key);
            return None;
        }

        tracing::debug!(key = %key, count = entry.activities.len(), "Cache hit");
        Some(entry.activities)
    }

    pub fn set(&self, user_id: &str, shape: &QueryShape, activities: &[NormalizedActivity]) {
        self.set_at(user_id, shape, activities, Utc::now())
    }

    /// Write with `now` as the entry timestamp.
    pub fn set_at(
        &self,
        user_id: &str,
        shape: &QueryShape,
        activities: &[NormalizedActivity],
        now: DateTime<Utc>,
    ) {
        let entry = CacheEntry {
            activities: activities.to_vec(),
            timestamp: now.timestamp_millis(),
        };
        match serde_json::to_string(&entry) {
            Ok(raw) => {
                self.entries.insert(self.key(user_id, shape), raw);
            }
            Err(e) => tracing::warn!(user_id, error = %e, "Failed to serialize cache entry"),
        }
    }

    /// Remove every entry for one user. Returns the number removed.
    pub fn clear(&self, user_id: &str) -> usize {
        let base = format!("{}{}", self.prefix, user_id);
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| belongs_to(e.key(), &base))
            .map(|e| e.key().clone())
            .collect();

        for key in &keys {
            self.entries.remove(key);
        }
        keys.len()
    }

    /// Remove every entry under this cache's prefix.
    pub fn clear_all(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&self.prefix));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether `key` is `base` itself or `base` plus a range suffix.
///
/// Checks the suffix shape so user "a" does not match user "a_b".
fn belongs_to(key: &str, base: &str) -> bool {
    let Some(rest) = key.strip_prefix(base) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }
    let Some(range) = rest.strip_prefix('_') else {
        return false;
    };
    match range.split_once('_') {
        Some((after, before)) => {
            after.parse::<i64>().is_ok() && (before == OPEN_END || before.parse::<i64>().is_ok())
        }
        None => false,
    }
}
