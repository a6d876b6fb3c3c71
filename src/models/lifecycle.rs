use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Active,
    Paused,
    Ended,
}

impl std::fmt::Display for PollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PollStatus::Active => "active",
            PollStatus::Paused => "paused",
            PollStatus::Ended => "ended",
        };
        f.write_str(label)
    }
}

/// Invariant: `status == Ended` implies `!allow_voting`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollLifecycleState {
    pub status: PollStatus,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub allow_voting: bool,
}

impl PollLifecycleState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            status: PollStatus::Active,
            start_date: now,
            end_date: None,
            allow_voting: true,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| now > end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    pub default_duration_days: u32,
    pub auto_end: bool,
    pub allow_voting: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            default_duration_days: 30,
            auto_end: true,
            allow_voting: true,
        }
    }
}

/// Persisted lifecycle document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleConfig {
    pub polls: BTreeMap<String, PollLifecycleState>,
    pub global_settings: GlobalSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRemaining {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl TimeRemaining {
    pub fn from_duration(remaining: chrono::Duration) -> Self {
        let minutes_total = remaining.num_minutes();
        Self {
            days: remaining.num_days(),
            hours: (minutes_total / 60) % 24,
            minutes: minutes_total % 60,
        }
    }
}

/// Published after every status mutation so live views can redraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub poll_id: String,
    pub status: PollStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndedPolicy {
    Terminal,
    AdminOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateVotePolicy {
    Allow,
    Reject,
}
