use chrono::Utc;
use tracing::{info, warn};

use crate::{
    config::startup::AppContext,
    error::PollsError,
    models::{
        aggregate::{AggregateResult, FilterSet},
        response::{PollResponse, ResponseContext},
    },
    repositories::response_repository::AppendOutcome,
    services::{
        aggregator::Aggregator,
        geolocation::{resolve_location, LocationHint},
        stats::StatsService,
    },
};

/// What a voter sends along with the chosen option.
#[derive(Debug, Clone, Default)]
pub struct VoteInput {
    pub option: Option<String>,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VoteReceipt {
    pub response: PollResponse,
    pub demographics_completed: bool,
    pub results: AggregateResult,
}

pub struct VoteService<'a> {
    ctx: &'a AppContext,
}

impl<'a> VoteService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    /// Validates, appends locally, then hands the record to the remote
    /// channels without waiting for them.
    pub async fn record_response(
        &self,
        poll_id: &str,
        selected_option: &str,
        session_id: &str,
        context: ResponseContext,
    ) -> Result<AppendOutcome, PollsError> {
        let poll = self
            .ctx
            .catalog
            .get(poll_id)
            .ok_or_else(|| PollsError::InvalidVote(format!("unknown poll {poll_id}")))?;
        if !poll.has_option(selected_option) {
            return Err(PollsError::InvalidVote(format!(
                "{selected_option:?} is not an option of {poll_id}"
            )));
        }

        let response = PollResponse {
            poll_id: poll.id.clone(),
            selected_option: selected_option.to_string(),
            question: poll.question.clone(),
            category: poll.category.clone(),
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            context,
        };

        let outcome = self
            .ctx
            .store
            .write()
            .await
            .append(response, self.ctx.settings.duplicate_votes)?;

        info!(
            poll_id,
            session_id,
            country = outcome.response.country(),
            "response recorded"
        );
        self.ctx.notify_refresh();
        self.ctx.sync.spawn_dispatch(outcome.response.clone());
        Ok(outcome)
    }

    /// The full voter flow: gates first, then location, then the store.
    pub async fn cast_vote(
        &self,
        poll_id: &str,
        session_id: &str,
        input: VoteInput,
    ) -> Result<VoteReceipt, PollsError> {
        if self.ctx.catalog.get(poll_id).is_none() {
            return Err(PollsError::InvalidVote(format!("unknown poll {poll_id}")));
        }
        if let Err(e) = self.ctx.lifecycle.lock().await.check_accepts_votes(poll_id) {
            warn!(poll_id, error = %e, "vote blocked");
            return Err(e);
        }
        let option = input
            .option
            .filter(|o| !o.trim().is_empty())
            .ok_or(PollsError::NoOptionSelected)?;

        let hint = LocationHint {
            ip: input.ip,
            timezone: input.timezone,
        };
        let location = resolve_location(self.ctx.locator.as_deref(), &hint).await;
        let context = location.into_context(input.user_agent, input.language);

        let outcome = self
            .record_response(poll_id, &option, session_id, context)
            .await?;
        StatsService::new(self.ctx).refresh_local().await;

        let results = {
            let store = self.ctx.store.read().await;
            Aggregator::new(&self.ctx.catalog, store.index()).aggregate(
                poll_id,
                store.responses(),
                &FilterSet::default(),
            )?
        };

        Ok(VoteReceipt {
            demographics_completed: outcome.demographic.is_some(),
            response: outcome.response,
            results,
        })
    }
}
