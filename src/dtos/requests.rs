use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::aggregate::{FilterSet, TimeWindow};

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option: Option<String>,
    pub timezone: Option<String>,
    pub language: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResultSource {
    #[default]
    Local,
    Remote,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ResultQueryParams {
    pub country: Option<String>,
    pub age: Option<String>,
    pub residence: Option<String>,
    pub affiliation: Option<String>,
    pub category: Option<String>,
    pub time: Option<String>,
    pub source: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "all")
        .map(str::to_string)
}

impl ResultQueryParams {
    /// Blank and `all` values mean "no filter".
    pub fn filters(&self) -> FilterSet {
        FilterSet {
            country: non_blank(&self.country),
            age: non_blank(&self.age),
            residence: non_blank(&self.residence),
            affiliation: non_blank(&self.affiliation),
            category: non_blank(&self.category),
            time: non_blank(&self.time).and_then(|t| time_window(&t)),
        }
    }

    /// Anything other than `remote` reads the local store.
    pub fn source(&self) -> ResultSource {
        match non_blank(&self.source).as_deref() {
            Some("remote") => ResultSource::Remote,
            _ => ResultSource::Local,
        }
    }
}

fn time_window(value: &str) -> Option<TimeWindow> {
    match value {
        "today" => Some(TimeWindow::Today),
        "week" => Some(TimeWindow::Week),
        "month" => Some(TimeWindow::Month),
        _ => None,
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EndDateRequest {
    pub end_date: DateTime<Utc>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct DurationRequest {
    pub days: Option<u32>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GlobalVotingRequest {
    pub allow_voting: bool,
}
