use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use tracing::info;

use crate::models::lifecycle::{DuplicateVotePolicy, EndedPolicy};

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub poll_catalog: PathBuf,
    pub webhook_urls: Vec<String>,
    pub collector_url: Option<String>,
    pub cors_origin: String,
    pub session_secure: bool,
    pub session_days: i64,
    pub stats_refresh: Duration,
    pub remote_timeout: Duration,
    pub geo_lookup: bool,
    pub ended_policy: EndedPolicy,
    pub duplicate_votes: DuplicateVotePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".to_string(),
            data_dir: PathBuf::from("./data/state"),
            poll_catalog: PathBuf::from("./data/polls.json"),
            webhook_urls: Vec::new(),
            collector_url: None,
            cors_origin: "http://localhost:8000".to_string(),
            session_secure: false,
            session_days: 365,
            stats_refresh: Duration::from_secs(15),
            remote_timeout: Duration::from_secs(10),
            geo_lookup: true,
            ended_policy: EndedPolicy::AdminOverride,
            duplicate_votes: DuplicateVotePolicy::Allow,
        }
    }
}

/// Reads variables through `lookup`; blank values count as unset.
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn parsed<T>(&self, name: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.var(name) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| anyhow!("{name} has an invalid value {raw:?}: {e}")),
        }
    }

    fn seconds(&self, name: &str, default: Duration) -> anyhow::Result<Duration> {
        match self.parsed(name, default.as_secs())? {
            0 => Err(anyhow!("{name} must be at least 1 second")),
            secs => Ok(Duration::from_secs(secs)),
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let vars = Env { lookup };
        let defaults = Settings::default();

        let webhook_urls: Vec<String> = vars
            .var("WEBHOOK_URLS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let collector_url = vars.var("COLLECTOR_URL").or_else(|| webhook_urls.first().cloned());

        let ended_policy = match vars.var("ENDED_POLICY").as_deref() {
            None | Some("override") => EndedPolicy::AdminOverride,
            Some("terminal") => EndedPolicy::Terminal,
            Some(other) => {
                return Err(anyhow!(
                    "ENDED_POLICY must be terminal or override, got {other:?}"
                ))
            }
        };
        let duplicate_votes = match vars.var("DUPLICATE_VOTES").as_deref() {
            None | Some("allow") => DuplicateVotePolicy::Allow,
            Some("reject") => DuplicateVotePolicy::Reject,
            Some(other) => {
                return Err(anyhow!(
                    "DUPLICATE_VOTES must be allow or reject, got {other:?}"
                ))
            }
        };

        let settings = Settings {
            bind_addr: vars.var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            data_dir: vars.var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            poll_catalog: vars
                .var("POLL_CATALOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.poll_catalog),
            webhook_urls,
            collector_url,
            cors_origin: vars.var("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            session_secure: vars.parsed("SESSION_SECURE", defaults.session_secure)?,
            session_days: match vars.parsed("SESSION_DAYS", defaults.session_days)? {
                days if days < 1 => return Err(anyhow!("SESSION_DAYS must be at least 1")),
                days => days,
            },
            stats_refresh: vars
                .seconds("STATS_REFRESH_SECS", defaults.stats_refresh)
                .context("reading the stats refresh period")?,
            remote_timeout: vars.seconds("REMOTE_TIMEOUT_SECS", defaults.remote_timeout)?,
            geo_lookup: vars.parsed("GEO_LOOKUP", defaults.geo_lookup)?,
            ended_policy,
            duplicate_votes,
        };

        info!(
            bind_addr = %settings.bind_addr,
            webhooks = settings.webhook_urls.len(),
            collector = settings.collector_url.is_some(),
            "settings loaded"
        );
        Ok(settings)
    }
}
