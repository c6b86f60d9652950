// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Events, registrations, and participant profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time_utils::{end_of_day_utc, start_of_day_utc, TimeWindow};

/// A competition with a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID (also used as document ID)
    pub id: String,
    pub name: String,
    /// First day, local date (`YYYY-MM-DD`)
    pub start_date: String,
    /// Last day, local date; open-ended when absent
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub active: bool,
    /// Whether the activity partition has been provisioned
    #[serde(default)]
    pub activities_provisioned: bool,
    /// Partition key for `event_activities`; absent until provisioned
    #[serde(default)]
    pub partition_id: Option<String>,
}

impl Event {
    /// Local midnight of the first day, `None` if `start_date` is malformed.
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        start_of_day_utc(&self.start_date)
    }

    pub fn has_started_at(&self, now: DateTime<Utc>) -> bool {
        self.starts_at().is_some_and(|start| now >= start)
    }

    /// `[start of first day, end of last day or now]`.
    pub fn window_at(&self, now: DateTime<Utc>) -> Option<TimeWindow> {
        let after = self.starts_at()?;
        let before = match self.end_date.as_deref().map(str::trim) {
            Some(end) if !end.is_empty() => end_of_day_utc(end),
            _ => now,
        };
        Some(TimeWindow::new(after, before))
    }

    pub fn is_open_ended(&self) -> bool {
        self.end_date.as_deref().map_or(true, |d| d.trim().is_empty())
    }
}

/// Payment state of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Ties a user to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub event_id: String,
    pub user_id: String,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Registration {
    /// Only paid registrations count as leaderboard participants.
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Public profile used for leaderboard display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Identity provider user ID (also used as document ID)
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Profile {
    /// Display name, falling back to email.
    pub fn leaderboard_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
    }
}
