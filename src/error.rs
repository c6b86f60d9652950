// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types shared by the sync pipeline.

/// Application error type.
///
/// Single-user operations propagate these to the caller; batch operations
/// count them in their tallies instead.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No usable credential on file for the user.
    #[error("Strava account not connected")]
    NotConnected,

    /// The token endpoint rejected a refresh or code exchange.
    #[error("Credential refresh failed: {0}")]
    CredentialRefreshFailed(String),

    /// Non-2xx (or transport failure, status 0) from the activities endpoint.
    #[error("Activity fetch failed (HTTP {status}): {message}")]
    FetchFailed { status: u16, message: String },

    #[error("Strava rate limit exceeded")]
    RateLimited,

    #[error("Persistence error: {0}")]
    PersistenceFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the user has to go through the connect flow again.
    pub fn requires_reconnect(&self) -> bool {
        match self {
            AppError::NotConnected | AppError::CredentialRefreshFailed(_) => true,
            AppError::FetchFailed { status, .. } => *status == 401,
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited)
    }

    /// HTTP status carried by a fetch failure, if any.
    pub fn fetch_status(&self) -> Option<u16> {
        match self {
            AppError::FetchFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, AppError>;
