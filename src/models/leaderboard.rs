// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Derived leaderboard types. Recomputed on every render, never stored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{ActivityCategory, NormalizedActivity};

/// Which categories may count toward eligible days.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActivityTypeFilter {
    #[default]
    All,
    Only(ActivityCategory),
}

impl ActivityTypeFilter {
    pub fn matches(&self, category: &ActivityCategory) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == category,
        }
    }
}

impl FromStr for ActivityTypeFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        if name.is_empty() || name == "all" {
            Ok(Self::All)
        } else {
            Ok(Self::Only(ActivityCategory::from_name(&name)))
        }
    }
}

/// One registered, paid participant and the activities to score.
#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: String,
    pub display_name: String,
    pub activities: Vec<NormalizedActivity>,
}

/// Per-user standing for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    /// 1-based position after sorting
    pub rank: u32,
    pub user_id: String,
    pub display_name: String,
    /// Distinct local dates with at least one eligible activity
    #[cfg_attr(feature = "binding-generation", ts(type = "string[]"))]
    pub eligible_days: BTreeSet<NaiveDate>,
    pub eligible_activities: u32,
    pub eligible_distance_m: f64,
    pub total_activities: u32,
    pub total_distance_m: f64,
}

impl LeaderboardEntry {
    pub fn new(user_id: String, display_name: String) -> Self {
        Self {
            rank: 0,
            user_id,
            display_name,
            eligible_days: BTreeSet::new(),
            eligible_activities: 0,
            eligible_distance_m: 0.0,
            total_activities: 0,
            total_distance_m: 0.0,
        }
    }

    pub fn eligible_day_count(&self) -> usize {
        self.eligible_days.len()
    }
}

/// A rendered leaderboard for one event.
#[derive(Debug, Clone, Serialize)]
pub struct Leaderboard {
    pub event_id: String,
    pub event_name: String,
    /// Filter name (`all` or a category)
    pub activity_type: String,
    pub entries: Vec<LeaderboardEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parsing() {
        assert_eq!("all".parse::<ActivityTypeFilter>().unwrap(), ActivityTypeFilter::All);
        assert_eq!("".parse::<ActivityTypeFilter>().unwrap(), ActivityTypeFilter::All);
        assert_eq!(
            "Walk".parse::<ActivityTypeFilter>().unwrap(),
            ActivityTypeFilter::Only(ActivityCategory::Walk)
        );
    }

    #[test]
    fn test_filter_matches() {
        assert!(ActivityTypeFilter::All.matches(&ActivityCategory::Swimming));
        let run_only = ActivityTypeFilter::Only(ActivityCategory::Run);
        assert!(run_only.matches(&ActivityCategory::Run));
        assert!(!run_only.matches(&ActivityCategory::Walk));
    }
}
