// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Delegated Strava credential for one user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Stored OAuth tokens, one document per user.
///
/// Created on the first authorization grant. Disconnecting nulls the
/// tokens but keeps the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Identity provider user ID (also used as document ID)
    pub user_id: String,
    pub access_token: Option<String>,
    /// May be rotated by Strava on every refresh
    pub refresh_token: Option<String>,
    /// Access token expiry (Unix seconds)
    pub expires_at: Option<i64>,
    /// Strava athlete ID
    pub athlete_id: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Both tokens, if the user is connected.
    pub fn tokens(&self) -> Option<(&str, &str)> {
        match (self.access_token.as_deref(), self.refresh_token.as_deref()) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some((access, refresh))
            }
            _ => None,
        }
    }

    /// True once `now` is within the refresh margin of expiry.
    ///
    /// A missing expiry is treated as already expired.
    pub fn needs_refresh_at(&self, now_unix: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now_unix >= expires_at - TOKEN_REFRESH_MARGIN_SECS,
            None => true,
        }
    }

    /// Drop the tokens, keeping the record and athlete link.
    pub fn disconnected(self, now: DateTime<Utc>) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_at: None,
            updated_at: Some(now),
            ..self
        }
    }
}
