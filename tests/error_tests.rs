// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use club_sync::error::AppError;

#[test]
fn test_requires_reconnect_matches() {
    assert!(AppError::NotConnected.requires_reconnect());

    let err = AppError::CredentialRefreshFailed("HTTP 400: invalid_grant".to_string());
    assert!(err.requires_reconnect());

    let err = AppError::FetchFailed {
        status: 401,
        message: "Authorization Error".to_string(),
    };
    assert!(err.requires_reconnect());
}

#[test]
fn test_requires_reconnect_no_match() {
    let err = AppError::FetchFailed {
        status: 500,
        message: "Internal Server Error".to_string(),
    };
    assert!(!err.requires_reconnect());

    assert!(!AppError::RateLimited.requires_reconnect());

    let err = AppError::BadRequest("Bad Request".to_string());
    assert!(!err.requires_reconnect());
}

#[test]
fn test_display_includes_status() {
    let err = AppError::FetchFailed {
        status: 503,
        message: "unavailable".to_string(),
    };
    assert_eq!(err.to_string(), "Activity fetch failed (HTTP 503): unavailable");
    assert_eq!(err.fetch_status(), Some(503));
    assert_eq!(AppError::NotConnected.fetch_status(), None);
}

#[test]
fn test_anyhow_converts_to_internal() {
    let err: AppError = anyhow::anyhow!("boom").into();
    assert!(matches!(err, AppError::Internal(_)));
    assert!(!err.is_rate_limited());
    assert!(AppError::RateLimited.is_rate_limited());
}
