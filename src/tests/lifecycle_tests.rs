use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::broadcast::error::TryRecvError;

use crate::{
    error::PollsError,
    models::lifecycle::{EndedPolicy, LifecycleConfig, PollStatus, TimeRemaining},
    repositories::{
        kv_store::{load_json, KeyValueStore, MemoryKvStore, POLL_CONFIG_KEY},
        lifecycle_repository::LifecycleRepository,
    },
    services::lifecycle::LifecycleManager,
};

fn manager_with(kv: Arc<dyn KeyValueStore>, policy: EndedPolicy) -> LifecycleManager {
    LifecycleManager::new(LifecycleRepository::new(kv), policy)
}

fn manager(policy: EndedPolicy) -> LifecycleManager {
    manager_with(Arc::new(MemoryKvStore::new()), policy)
}

#[test]
fn unconfigured_poll_is_active() {
    let mut lifecycle = manager(EndedPolicy::AdminOverride);

    assert_eq!(lifecycle.status("p1"), PollStatus::Active);
    assert!(lifecycle.is_poll_active("p1"));
    assert_eq!(lifecycle.time_remaining("p1"), None);
    assert!(lifecycle.check_accepts_votes("p1").is_ok());
}

#[test]
fn paused_poll_rejects_votes() {
    let mut lifecycle = manager(EndedPolicy::AdminOverride);

    lifecycle.pause("p1").unwrap();

    assert!(!lifecycle.is_poll_active("p1"));
    assert_eq!(lifecycle.check_accepts_votes("p1"), Err(PollsError::PollPaused));

    lifecycle.activate("p1").unwrap();
    assert!(lifecycle.is_poll_active("p1"));
}

#[test]
fn ended_poll_is_inactive_and_closed_for_voting() {
    let mut lifecycle = manager(EndedPolicy::AdminOverride);

    lifecycle.end("p1").unwrap();

    assert!(!lifecycle.is_poll_active("p1"));
    assert!(!lifecycle.config().polls["p1"].allow_voting);
    assert_eq!(lifecycle.check_accepts_votes("p1"), Err(PollsError::PollEnded));
}

#[test]
fn past_end_date_expires_lazily_and_only_once() {
    let mut lifecycle = manager(EndedPolicy::AdminOverride);
    lifecycle.set_end_date("p1", Utc::now() - Duration::seconds(1));

    let mut events = lifecycle.subscribe();

    assert_eq!(lifecycle.status("p1"), PollStatus::Ended);
    assert_eq!(lifecycle.status("p1"), PollStatus::Ended);

    let event = events.try_recv().unwrap();
    assert_eq!(event.poll_id, "p1");
    assert_eq!(event.status, PollStatus::Ended);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert!(!lifecycle.config().polls["p1"].allow_voting);
}

#[test]
fn future_end_date_leaves_poll_active() {
    let mut lifecycle = manager(EndedPolicy::AdminOverride);
    let now = Utc::now();
    lifecycle.set_end_date(
        "p1",
        now + Duration::days(2) + Duration::hours(3) + Duration::minutes(30) + Duration::seconds(10),
    );

    assert_eq!(lifecycle.status_at("p1", now), PollStatus::Active);
    assert_eq!(
        lifecycle.time_remaining_at("p1", now),
        Some(TimeRemaining {
            days: 2,
            hours: 3,
            minutes: 30
        })
    );
}

#[test]
fn terminal_policy_refuses_to_leave_ended() {
    let mut lifecycle = manager(EndedPolicy::Terminal);
    lifecycle.end("p1").unwrap();

    assert_eq!(lifecycle.activate("p1"), Err(PollsError::CannotModifyClosed));
    assert_eq!(lifecycle.pause("p1"), Err(PollsError::CannotModifyClosed));
    assert_eq!(lifecycle.status("p1"), PollStatus::Ended);
}

#[test]
fn override_policy_reopens_ended_poll() {
    let mut lifecycle = manager(EndedPolicy::AdminOverride);
    lifecycle.set_end_date("p1", Utc::now() - Duration::hours(1));
    assert_eq!(lifecycle.status("p1"), PollStatus::Ended);

    assert_eq!(lifecycle.pause("p1"), Err(PollsError::CannotModifyClosed));
    assert_eq!(lifecycle.activate("p1"), Ok(PollStatus::Active));

    assert_eq!(lifecycle.status("p1"), PollStatus::Active);
    assert!(lifecycle.is_poll_active("p1"));
    assert_eq!(lifecycle.config().polls["p1"].end_date, None);
}

#[test]
fn repeated_transition_publishes_nothing() {
    let mut lifecycle = manager(EndedPolicy::AdminOverride);
    lifecycle.pause("p1").unwrap();
    let mut events = lifecycle.subscribe();

    lifecycle.pause("p1").unwrap();

    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn global_kill_switch_blocks_every_poll() {
    let mut lifecycle = manager(EndedPolicy::AdminOverride);

    lifecycle.set_global_voting(false);
    assert_eq!(lifecycle.check_accepts_votes("p1"), Err(PollsError::VotingDisabled));
    assert_eq!(lifecycle.check_accepts_votes("p2"), Err(PollsError::VotingDisabled));
    // Per-poll state is untouched.
    assert!(lifecycle.is_poll_active("p1"));

    lifecycle.set_global_voting(true);
    assert!(lifecycle.check_accepts_votes("p1").is_ok());
}

#[test]
fn duration_defaults_and_rejects_zero() {
    let mut lifecycle = manager(EndedPolicy::AdminOverride);

    assert!(matches!(
        lifecycle.set_duration("p1", Some(0)),
        Err(PollsError::InvalidPollDates(_))
    ));

    let end = lifecycle.set_duration("p1", None).unwrap();
    let days = (end - Utc::now()).num_hours();
    assert!((29 * 24..=30 * 24).contains(&days));

    let end = lifecycle.set_duration("p1", Some(7)).unwrap();
    assert_eq!(lifecycle.config().polls["p1"].end_date, Some(end));
}

#[test]
fn state_survives_a_restart() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
    {
        let mut lifecycle = manager_with(kv.clone(), EndedPolicy::AdminOverride);
        lifecycle.pause("p1").unwrap();
        lifecycle.end("p2").unwrap();
    }

    let mut lifecycle = manager_with(kv.clone(), EndedPolicy::AdminOverride);
    assert_eq!(lifecycle.status("p1"), PollStatus::Paused);
    assert_eq!(lifecycle.status("p2"), PollStatus::Ended);
}

#[test]
fn corrupt_configuration_is_replaced_with_defaults() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
    kv.put(POLL_CONFIG_KEY, "{\"polls\": [not json").unwrap();

    let mut lifecycle = manager_with(kv.clone(), EndedPolicy::AdminOverride);

    assert_eq!(lifecycle.status("p1"), PollStatus::Active);
    assert!(lifecycle.global_voting());
    assert_eq!(
        kv.get(&format!("{POLL_CONFIG_KEY}.corrupt")).unwrap().as_deref(),
        Some("{\"polls\": [not json")
    );
    let stored: Option<LifecycleConfig> = load_json(kv.as_ref(), POLL_CONFIG_KEY).unwrap();
    assert_eq!(stored, Some(LifecycleConfig::default()));
}

#[test]
fn ended_state_loaded_with_voting_allowed_is_normalized() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
    let raw = format!(
        r#"{{"polls":{{"p1":{{"status":"ended","startDate":"{}","allowVoting":true}}}},
            "globalSettings":{{"defaultDurationDays":30,"autoEnd":true,"allowVoting":true}}}}"#,
        Utc::now().to_rfc3339()
    );
    kv.put(POLL_CONFIG_KEY, &raw).unwrap();

    let mut lifecycle = manager_with(kv, EndedPolicy::AdminOverride);

    assert!(!lifecycle.config().polls["p1"].allow_voting);
    assert!(!lifecycle.is_poll_active("p1"));
}

#[test]
fn past_end_date_ends_poll_even_when_auto_end_is_off() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
    let raw = format!(
        r#"{{"polls":{{"p1":{{"status":"active","startDate":"{}","endDate":"{}","allowVoting":true}}}},
            "globalSettings":{{"defaultDurationDays":30,"autoEnd":false,"allowVoting":true}}}}"#,
        (Utc::now() - Duration::days(3)).to_rfc3339(),
        (Utc::now() - Duration::hours(1)).to_rfc3339()
    );
    kv.put(POLL_CONFIG_KEY, &raw).unwrap();

    let mut lifecycle = manager_with(kv, EndedPolicy::AdminOverride);

    assert_eq!(lifecycle.status("p1"), PollStatus::Ended);
    assert_eq!(lifecycle.check_accepts_votes("p1"), Err(PollsError::PollEnded));
}
