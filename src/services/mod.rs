// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod backoff;
pub mod cache;
pub mod leaderboard;
pub mod strava;
pub mod sync;

pub use backoff::BackoffPolicy;
pub use cache::{ActivityCache, QueryShape};
pub use leaderboard::{build_leaderboard, LeaderboardService};
pub use strava::{StravaClient, StravaService};
pub use sync::{ActivitySource, BatchSyncTally, SyncReport};
