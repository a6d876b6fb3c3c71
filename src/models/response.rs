use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where and how a vote was cast. Every field is best effort.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseContext {
    #[serde(default)]
    pub user_country: Option<String>,
    #[serde(default)]
    pub user_state: Option<String>,
    #[serde(default)]
    pub user_city: Option<String>,
    #[serde(default, deserialize_with = "lenient::coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::coordinate")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// One recorded vote. Serialized in the collector's record shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub poll_id: String,
    #[serde(rename = "response")]
    pub selected_option: String,
    pub question: String,
    pub category: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    #[serde(flatten)]
    pub context: ResponseContext,
}

impl PollResponse {
    pub fn country(&self) -> &str {
        self.context.user_country.as_deref().unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DemographicRecord {
    pub age_group: String,
    pub residence: String,
    pub affiliation: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedPoll {
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Collector rows carry coordinates as numbers, numeric strings or "unknown".
    pub fn coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    }
}
