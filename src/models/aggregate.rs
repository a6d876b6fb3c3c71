use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Today,
    Week,
    Month,
}

impl TimeWindow {
    /// Largest whole-day age (rounded up) a response may have.
    pub fn max_days(self) -> i64 {
        match self {
            TimeWindow::Today => 1,
            TimeWindow::Week => 7,
            TimeWindow::Month => 30,
        }
    }
}

/// Optional facets; an unset facet does not filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeWindow>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        *self == FilterSet::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptionTally {
    pub option: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub poll_id: String,
    pub question: String,
    pub category: String,
    pub total: u64,
    pub options: Vec<OptionTally>,
}

impl AggregateResult {
    pub fn get(&self, option: &str) -> Option<&OptionTally> {
        self.options.iter().find(|t| t.option == option)
    }

    pub fn percentage_sum(&self) -> f64 {
        self.options.iter().map(|t| t.percentage).sum()
    }
}

/// Share of `count` in `total` with one decimal; zero when nothing matched.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((count as f64 / total as f64) * 1000.0).round() / 10.0
}
