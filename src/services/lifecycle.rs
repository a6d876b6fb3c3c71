use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::{
    error::PollsError,
    models::lifecycle::{
        EndedPolicy, LifecycleConfig, LifecycleEvent, PollLifecycleState, PollStatus,
        TimeRemaining,
    },
    repositories::lifecycle_repository::LifecycleRepository,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleView {
    pub status: PollStatus,
    pub is_active: bool,
    pub time_remaining: Option<TimeRemaining>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Per-poll active/paused/ended state machine plus the global kill-switch.
///
/// Expiry is applied lazily: any status query past a poll's end date moves it
/// to `Ended` once, persists the change and publishes a [`LifecycleEvent`].
pub struct LifecycleManager {
    repository: LifecycleRepository,
    config: LifecycleConfig,
    policy: EndedPolicy,
    events: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleManager {
    pub fn new(repository: LifecycleRepository, policy: EndedPolicy) -> Self {
        let config = repository.load();
        let (events, _) = broadcast::channel(64);
        Self {
            repository,
            config,
            policy,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn global_voting(&self) -> bool {
        self.config.global_settings.allow_voting
    }

    pub fn set_global_voting(&mut self, allow: bool) {
        self.config.global_settings.allow_voting = allow;
        self.save();
        info!(allow, "global voting {}", if allow { "enabled" } else { "disabled" });
    }

    pub fn set_status(&mut self, poll_id: &str, status: PollStatus) -> Result<PollStatus, PollsError> {
        self.set_status_at(poll_id, status, Utc::now())
    }

    pub fn set_status_at(
        &mut self,
        poll_id: &str,
        status: PollStatus,
        now: DateTime<Utc>,
    ) -> Result<PollStatus, PollsError> {
        let policy = self.policy;
        let state = self
            .config
            .polls
            .entry(poll_id.to_string())
            .or_insert_with(|| PollLifecycleState::new(now));

        match (state.status, status) {
            (PollStatus::Ended, PollStatus::Ended) => return Ok(PollStatus::Ended),
            (PollStatus::Ended, PollStatus::Paused) => return Err(PollsError::CannotModifyClosed),
            (PollStatus::Ended, PollStatus::Active) => {
                if policy == EndedPolicy::Terminal {
                    return Err(PollsError::CannotModifyClosed);
                }
                state.status = PollStatus::Active;
                state.allow_voting = true;
                // An elapsed end date would re-expire the poll on the next read.
                if state.is_expired(now) {
                    state.end_date = None;
                }
            }
            (current, requested) if current == requested => return Ok(current),
            (_, PollStatus::Ended) => {
                state.status = PollStatus::Ended;
                state.allow_voting = false;
            }
            (_, requested) => state.status = requested,
        }

        self.save();
        self.publish(poll_id, status);
        info!(poll_id, %status, "poll status changed");
        Ok(status)
    }

    pub fn activate(&mut self, poll_id: &str) -> Result<PollStatus, PollsError> {
        self.set_status(poll_id, PollStatus::Active)
    }

    pub fn pause(&mut self, poll_id: &str) -> Result<PollStatus, PollsError> {
        self.set_status(poll_id, PollStatus::Paused)
    }

    pub fn end(&mut self, poll_id: &str) -> Result<PollStatus, PollsError> {
        self.set_status(poll_id, PollStatus::Ended)
    }

    /// Sets or moves the expiry. The status is left untouched until the next read.
    pub fn set_end_date(&mut self, poll_id: &str, end_date: DateTime<Utc>) {
        let now = Utc::now();
        let state = self
            .config
            .polls
            .entry(poll_id.to_string())
            .or_insert_with(|| PollLifecycleState::new(now));
        state.end_date = Some(end_date);
        let status = state.status;

        self.save();
        self.publish(poll_id, status);
        info!(poll_id, %end_date, "poll end date set");
    }

    /// Ends the poll `days` from now, or after the configured default duration.
    pub fn set_duration(
        &mut self,
        poll_id: &str,
        days: Option<u32>,
    ) -> Result<DateTime<Utc>, PollsError> {
        let days = days.unwrap_or(self.config.global_settings.default_duration_days);
        if days == 0 {
            return Err(PollsError::InvalidPollDates(
                "duration must be at least one day".to_string(),
            ));
        }
        let end_date = Utc::now() + Duration::days(i64::from(days));
        self.set_end_date(poll_id, end_date);
        Ok(end_date)
    }

    pub fn status(&mut self, poll_id: &str) -> PollStatus {
        self.status_at(poll_id, Utc::now())
    }

    pub fn status_at(&mut self, poll_id: &str, now: DateTime<Utc>) -> PollStatus {
        let Some(state) = self.config.polls.get(poll_id) else {
            return PollStatus::Active;
        };
        let status = state.status;

        if status != PollStatus::Ended && state.is_expired(now) {
            self.expire(poll_id);
            return PollStatus::Ended;
        }
        status
    }

    fn expire(&mut self, poll_id: &str) {
        if let Some(state) = self.config.polls.get_mut(poll_id) {
            state.status = PollStatus::Ended;
            state.allow_voting = false;
        }
        self.save();
        self.publish(poll_id, PollStatus::Ended);
        info!(poll_id, "poll reached its end date");
    }

    pub fn is_poll_active(&mut self, poll_id: &str) -> bool {
        self.is_poll_active_at(poll_id, Utc::now())
    }

    pub fn is_poll_active_at(&mut self, poll_id: &str, now: DateTime<Utc>) -> bool {
        match self.status_at(poll_id, now) {
            PollStatus::Paused | PollStatus::Ended => false,
            PollStatus::Active => self
                .config
                .polls
                .get(poll_id)
                .map_or(true, |state| state.allow_voting),
        }
    }

    pub fn time_remaining(&self, poll_id: &str) -> Option<TimeRemaining> {
        self.time_remaining_at(poll_id, Utc::now())
    }

    pub fn time_remaining_at(&self, poll_id: &str, now: DateTime<Utc>) -> Option<TimeRemaining> {
        let end_date = self.config.polls.get(poll_id)?.end_date?;
        let remaining = end_date - now;
        if remaining <= Duration::zero() {
            return None;
        }
        Some(TimeRemaining::from_duration(remaining))
    }

    /// Checks the kill-switch and the poll's own state before any vote is stored.
    pub fn check_accepts_votes(&mut self, poll_id: &str) -> Result<(), PollsError> {
        if !self.global_voting() {
            return Err(PollsError::VotingDisabled);
        }
        if self.is_poll_active(poll_id) {
            return Ok(());
        }
        Err(match self.status(poll_id) {
            PollStatus::Ended => PollsError::PollEnded,
            PollStatus::Paused => PollsError::PollPaused,
            PollStatus::Active => PollsError::PollClosed,
        })
    }

    pub fn view(&mut self, poll_id: &str) -> LifecycleView {
        let now = Utc::now();
        let status = self.status_at(poll_id, now);
        LifecycleView {
            status,
            is_active: self.is_poll_active_at(poll_id, now),
            time_remaining: self.time_remaining_at(poll_id, now),
            end_date: self.config.polls.get(poll_id).and_then(|s| s.end_date),
        }
    }

    fn publish(&self, poll_id: &str, status: PollStatus) {
        // No receivers is fine.
        let _ = self.events.send(LifecycleEvent {
            poll_id: poll_id.to_string(),
            status,
        });
    }

    fn save(&self) {
        if let Err(e) = self.repository.save(&self.config) {
            error!(error = %e, "could not persist lifecycle configuration");
        }
    }
}
