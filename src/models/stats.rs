use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    aggregate::FilterSet,
    response::{DemographicRecord, PollResponse},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsTotals {
    #[serde(default)]
    pub visitors: u64,
    #[serde(default)]
    pub countries: u64,
    #[serde(default)]
    pub polls_completed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoterPin {
    pub session_id: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub first_vote_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_count: Option<u64>,
}

/// Body of the collector's `?stats=1` answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    #[serde(default)]
    pub totals: StatsTotals,
    #[serde(default)]
    pub voters: Vec<VoterPin>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatsSource {
    Local,
    Global,
}

/// Display state, replaced wholesale on every refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub source: StatsSource,
    pub totals: StatsTotals,
    pub responses: u64,
    pub voters: Vec<VoterPin>,
    pub last_updated: DateTime<Utc>,
}

/// Persisted under the `stats` key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsCache {
    pub visitors: u64,
    pub countries: Vec<String>,
    pub polls_completed: u64,
    pub responses: u64,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub installation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CountryCount {
    pub country: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollStatistics {
    pub total_responses: u64,
    pub total_demographics: u64,
    pub polls_by_category: BTreeMap<String, u64>,
    pub responses_by_country: BTreeMap<String, u64>,
    pub responses_by_age: BTreeMap<String, u64>,
    pub responses_by_affiliation: BTreeMap<String, u64>,
    pub responses_by_residence: BTreeMap<String, u64>,
    pub response_timeline: Vec<TimelinePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub export_date: DateTime<Utc>,
    pub total_responses: u64,
    pub filters: FilterSet,
    pub installation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilteredExport {
    pub metadata: ExportMetadata,
    pub data: Vec<PollResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompleteExport {
    pub poll_responses: Vec<PollResponse>,
    pub demographics: Vec<DemographicRecord>,
    pub live_stats: StatsCache,
    pub export_timestamp: DateTime<Utc>,
    pub total_responses: u64,
}
