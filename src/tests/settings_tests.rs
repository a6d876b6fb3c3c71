use std::{collections::HashMap, time::Duration};

use crate::{
    config::settings::Settings,
    models::lifecycle::{DuplicateVotePolicy, EndedPolicy},
};

fn settings_from(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Settings::from_lookup(|name| vars.get(name).cloned())
}

#[test]
fn empty_environment_uses_defaults() {
    let settings = settings_from(&[]).unwrap();

    assert_eq!(settings.bind_addr, "0.0.0.0:9000");
    assert_eq!(settings.stats_refresh, Duration::from_secs(15));
    assert_eq!(settings.remote_timeout, Duration::from_secs(10));
    assert_eq!(settings.ended_policy, EndedPolicy::AdminOverride);
    assert_eq!(settings.duplicate_votes, DuplicateVotePolicy::Allow);
    assert!(settings.collector_url.is_none());
}

#[test]
fn first_webhook_doubles_as_collector() {
    let settings = settings_from(&[
        ("WEBHOOK_URLS", " https://a.example/hook , https://b.example/hook,"),
        ("STATS_REFRESH_SECS", "60"),
        ("DUPLICATE_VOTES", "reject"),
    ])
    .unwrap();

    assert_eq!(settings.webhook_urls.len(), 2);
    assert_eq!(settings.collector_url.as_deref(), Some("https://a.example/hook"));
    assert_eq!(settings.stats_refresh, Duration::from_secs(60));
    assert_eq!(settings.duplicate_votes, DuplicateVotePolicy::Reject);
}

#[test]
fn zero_second_periods_are_rejected() {
    for name in ["STATS_REFRESH_SECS", "REMOTE_TIMEOUT_SECS"] {
        let err = settings_from(&[(name, "0")]).unwrap_err();
        assert!(format!("{err:#}").contains(name), "{err:#}");
    }

    let err = settings_from(&[("SESSION_DAYS", "0")]).unwrap_err();
    assert!(err.to_string().contains("SESSION_DAYS"));
}

#[test]
fn malformed_values_name_the_variable() {
    let err = settings_from(&[("REMOTE_TIMEOUT_SECS", "soon")]).unwrap_err();
    assert!(err.to_string().contains("REMOTE_TIMEOUT_SECS"));

    let err = settings_from(&[("ENDED_POLICY", "forever")]).unwrap_err();
    assert!(err.to_string().contains("ENDED_POLICY"));
}
