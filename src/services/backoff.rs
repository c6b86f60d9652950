// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exponential backoff for Strava rate-limit (HTTP 429) responses.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Longest single wait between retries.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How many times, and how long, to wait after a 429.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, initial: Duration) -> Self {
        Self {
            max_retries,
            initial,
            max: MAX_BACKOFF,
        }
    }

    /// Fail on the first 429.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// Doubles from `initial`; a server-provided `Retry-After` wins. Both
    /// are capped at `max`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = retry_after.unwrap_or_else(|| {
            self.initial
                .checked_mul(2u32.saturating_pow(attempt))
                .unwrap_or(self.max)
        });
        delay.min(self.max)
    }
}

/// Parse a numeric `Retry-After` header (seconds). HTTP dates are ignored.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_exponential_backoff() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(0, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_max() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(20, None), MAX_BACKOFF);
        assert_eq!(policy.delay_for(40, None), MAX_BACKOFF);
    }

    #[test]
    fn test_retry_after_wins_but_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(15))),
            Duration::from_secs(15)
        );
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(900))),
            MAX_BACKOFF
        );
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }
}
