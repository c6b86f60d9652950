// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Normalized activity model for storage and aggregation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Canonical activity category.
///
/// Serialized as its lowercase name; unknown source types pass through
/// lowercased in [`ActivityCategory::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityCategory {
    Cycling,
    Run,
    Walk,
    Hiking,
    Swimming,
    Other(String),
}

impl ActivityCategory {
    /// Map a Strava activity type onto a category.
    ///
    /// Total: every input yields a category, unknown types become their
    /// own lowercased name.
    pub fn from_source(source_type: &str) -> Self {
        match source_type {
            "Ride" | "VirtualRide" | "E-BikeRide" => Self::Cycling,
            "Run" | "VirtualRun" => Self::Run,
            "Walk" => Self::Walk,
            "Hike" => Self::Hiking,
            "Swim" => Self::Swimming,
            other => Self::from_name(&other.to_lowercase()),
        }
    }

    /// Parse a canonical (already lowercased) category name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "cycling" => Self::Cycling,
            "run" => Self::Run,
            "walk" => Self::Walk,
            "hiking" => Self::Hiking,
            "swimming" => Self::Swimming,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Cycling => "cycling",
            Self::Run => "run",
            Self::Walk => "walk",
            Self::Hiking => "hiking",
            Self::Swimming => "swimming",
            Self::Other(name) => name,
        }
    }

    /// Minimum distance (meters, inclusive) for an activity to count
    /// toward an eligible day. `None` means never eligible.
    pub fn min_eligible_distance_m(&self) -> Option<f64> {
        match self {
            Self::Run | Self::Walk | Self::Hiking => Some(3_000.0),
            Self::Cycling => Some(10_000.0),
            Self::Swimming => Some(500.0),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for ActivityCategory {
    fn from(name: String) -> Self {
        Self::from_name(&name.to_lowercase())
    }
}

impl From<ActivityCategory> for String {
    fn from(category: ActivityCategory) -> Self {
        category.as_str().to_string()
    }
}

impl std::fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical activity record, independent of the Strava response shape.
///
/// Stored in `activities` (keyed by `external_id`) or in
/// `event_activities` (keyed by `event_id` + `external_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NormalizedActivity {
    /// Owning user (identity provider ID)
    pub user_id: String,
    /// Strava activity ID
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub external_id: u64,
    pub name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub category: ActivityCategory,
    pub distance_m: f64,
    pub moving_time_s: u32,
    pub elapsed_time_s: u32,
    pub elevation_m: f64,
    /// Calendar day in the athlete's local time (bucketing key)
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub local_date: NaiveDate,
    /// UTC start (range filtering)
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_instant: DateTime<Utc>,
    /// Set only on rows in the event partition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl NormalizedActivity {
    /// Whether this activity meets its category's distance threshold.
    pub fn meets_threshold(&self) -> bool {
        self.category
            .min_eligible_distance_m()
            .is_some_and(|min| self.distance_m >= min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(category: ActivityCategory, distance_m: f64) -> NormalizedActivity {
        NormalizedActivity {
            user_id: "user-1".to_string(),
            external_id: 1,
            name: "Test".to_string(),
            category,
            distance_m,
            moving_time_s: 0,
            elapsed_time_s: 0,
            elevation_m: 0.0,
            local_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            start_instant: DateTime::from_timestamp(1_717_228_800, 0).unwrap(),
            event_id: None,
        }
    }

    #[test]
    fn test_category_mapping_table() {
        assert_eq!(ActivityCategory::from_source("Ride"), ActivityCategory::Cycling);
        assert_eq!(ActivityCategory::from_source("VirtualRide"), ActivityCategory::Cycling);
        assert_eq!(ActivityCategory::from_source("E-BikeRide"), ActivityCategory::Cycling);
        assert_eq!(ActivityCategory::from_source("Run"), ActivityCategory::Run);
        assert_eq!(ActivityCategory::from_source("VirtualRun"), ActivityCategory::Run);
        assert_eq!(ActivityCategory::from_source("Walk"), ActivityCategory::Walk);
        assert_eq!(ActivityCategory::from_source("Hike"), ActivityCategory::Hiking);
        assert_eq!(ActivityCategory::from_source("Swim"), ActivityCategory::Swimming);
    }

    #[test]
    fn test_unknown_category_passes_through_lowercased() {
        let category = ActivityCategory::from_source("FutureSportXYZ");
        assert_eq!(category, ActivityCategory::Other("futuresportxyz".to_string()));
        assert_eq!(category.as_str(), "futuresportxyz");
        assert_eq!(ActivityCategory::from_source("").as_str(), "");
    }

    #[test]
    fn test_category_serializes_as_name() {
        let json = serde_json::to_string(&ActivityCategory::Hiking).unwrap();
        assert_eq!(json, "\"hiking\"");

        let parsed: ActivityCategory = serde_json::from_str("\"rowing\"").unwrap();
        assert_eq!(parsed, ActivityCategory::Other("rowing".to_string()));

        let parsed: ActivityCategory = serde_json::from_str("\"cycling\"").unwrap();
        assert_eq!(parsed, ActivityCategory::Cycling);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        assert!(activity(ActivityCategory::Run, 3000.0).meets_threshold());
        assert!(!activity(ActivityCategory::Run, 2999.999).meets_threshold());
        assert!(activity(ActivityCategory::Walk, 3000.0).meets_threshold());
        assert!(activity(ActivityCategory::Hiking, 3000.0).meets_threshold());
        assert!(activity(ActivityCategory::Cycling, 10000.0).meets_threshold());
        assert!(!activity(ActivityCategory::Cycling, 9999.0).meets_threshold());
        assert!(activity(ActivityCategory::Swimming, 500.0).meets_threshold());
        assert!(!activity(ActivityCategory::Other("yoga".into()), 1e9).meets_threshold());
    }
}
