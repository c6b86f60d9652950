// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod credential;
pub mod event;
pub mod leaderboard;

pub use activity::{ActivityCategory, NormalizedActivity};
pub use credential::Credential;
pub use event::{Event, PaymentStatus, Profile, Registration};
pub use leaderboard::{ActivityTypeFilter, Leaderboard, LeaderboardEntry, Participant};
