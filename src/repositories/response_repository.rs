use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use tracing::{error, info, warn};

use crate::{
    error::PollsError,
    models::{
        lifecycle::DuplicateVotePolicy,
        poll::DemographicPolls,
        response::{DemographicRecord, PollResponse, SubmittedPoll},
    },
    repositories::kv_store::{
        load_or_default, save_json, KeyValueStore, DEMOGRAPHICS_KEY, POLL_RESPONSES_KEY,
        SUBMITTED_POLLS_KEY,
    },
};

type SubmittedBySession = BTreeMap<String, BTreeMap<String, SubmittedPoll>>;

/// session id -> demographic poll id -> chosen options, for same-session joins.
#[derive(Debug, Clone, Default)]
pub struct SessionIndex {
    tracked: HashSet<String>,
    answers: HashMap<String, HashMap<String, Vec<String>>>,
}

impl SessionIndex {
    pub fn new<I, S>(tracked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tracked: tracked.into_iter().map(Into::into).collect(),
            answers: HashMap::new(),
        }
    }

    pub fn build(demographics: &DemographicPolls, responses: &[PollResponse]) -> Self {
        let mut index = Self::new(demographics.ids());
        for response in responses {
            index.record(response);
        }
        index
    }

    pub fn record(&mut self, response: &PollResponse) {
        if !self.tracked.contains(&response.poll_id) {
            return;
        }
        let options = self
            .answers
            .entry(response.session_id.clone())
            .or_default()
            .entry(response.poll_id.clone())
            .or_default();
        if !options.contains(&response.selected_option) {
            options.push(response.selected_option.clone());
        }
    }

    pub fn has_answer(&self, session_id: &str, poll_id: &str, option: &str) -> bool {
        self.answers
            .get(session_id)
            .and_then(|polls| polls.get(poll_id))
            .is_some_and(|options| options.iter().any(|o| o == option))
    }

    pub fn first_answer(&self, session_id: &str, poll_id: &str) -> Option<&str> {
        self.answers
            .get(session_id)
            .and_then(|polls| polls.get(poll_id))
            .and_then(|options| options.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub response: PollResponse,
    pub demographic: Option<DemographicRecord>,
}

/// Authoritative local list of cast votes plus the documents derived from it.
pub struct ResponseStore {
    kv: Arc<dyn KeyValueStore>,
    demographic_polls: DemographicPolls,
    responses: Vec<PollResponse>,
    index: SessionIndex,
    submitted: SubmittedBySession,
    demographics: Vec<DemographicRecord>,
}

impl ResponseStore {
    pub fn load(kv: Arc<dyn KeyValueStore>, demographic_polls: DemographicPolls) -> Self {
        let responses: Vec<PollResponse> = load_or_default(kv.as_ref(), POLL_RESPONSES_KEY);
        let submitted: SubmittedBySession = load_or_default(kv.as_ref(), SUBMITTED_POLLS_KEY);
        let demographics: Vec<DemographicRecord> = load_or_default(kv.as_ref(), DEMOGRAPHICS_KEY);
        let index = SessionIndex::build(&demographic_polls, &responses);

        info!(
            responses = responses.len(),
            demographics = demographics.len(),
            "response store loaded"
        );

        Self {
            kv,
            demographic_polls,
            responses,
            index,
            submitted,
            demographics,
        }
    }

    pub fn responses(&self) -> &[PollResponse] {
        &self.responses
    }

    pub fn index(&self) -> &SessionIndex {
        &self.index
    }

    pub fn demographics(&self) -> &[DemographicRecord] {
        &self.demographics
    }

    pub fn submitted(&self, session_id: &str, poll_id: &str) -> Option<&SubmittedPoll> {
        self.submitted
            .get(session_id)
            .and_then(|polls| polls.get(poll_id))
    }

    pub fn responses_by_session(&self, session_id: &str) -> usize {
        self.responses
            .iter()
            .filter(|r| r.session_id == session_id)
            .count()
    }

    /// Appends a validated response. The duplicate check and the append happen
    /// under the same borrow so concurrent votes cannot both pass the check.
    pub fn append(
        &mut self,
        response: PollResponse,
        policy: DuplicateVotePolicy,
    ) -> Result<AppendOutcome, PollsError> {
        if policy == DuplicateVotePolicy::Reject
            && self.submitted(&response.session_id, &response.poll_id).is_some()
        {
            return Err(PollsError::AlreadyVoted);
        }

        self.index.record(&response);
        self.submitted
            .entry(response.session_id.clone())
            .or_default()
            .insert(
                response.poll_id.clone(),
                SubmittedPoll {
                    response: response.selected_option.clone(),
                    timestamp: response.timestamp,
                },
            );
        self.responses.push(response.clone());
        let demographic = self.complete_demographics(&response);

        self.persist();

        Ok(AppendOutcome {
            response,
            demographic,
        })
    }

    fn complete_demographics(&mut self, response: &PollResponse) -> Option<DemographicRecord> {
        let session = response.session_id.as_str();
        if !self.demographic_polls.ids().contains(&response.poll_id.as_str()) {
            return None;
        }
        if self.demographics.iter().any(|d| d.session_id == session) {
            return None;
        }

        let polls = &self.demographic_polls;
        let record = DemographicRecord {
            age_group: self.index.first_answer(session, &polls.age)?.to_string(),
            residence: self.index.first_answer(session, &polls.residence)?.to_string(),
            affiliation: self
                .index
                .first_answer(session, &polls.affiliation)?
                .to_string(),
            timestamp: response.timestamp,
            session_id: session.to_string(),
            user_country: response.country().to_string(),
        };
        self.demographics.push(record.clone());
        Some(record)
    }

    /// Drops every stored record and derived document.
    pub fn clear(&mut self) {
        warn!(responses = self.responses.len(), "clearing response store");
        self.responses.clear();
        self.submitted.clear();
        self.demographics.clear();
        self.index = SessionIndex::new(self.demographic_polls.ids());
        self.persist();
    }

    /// Failures are logged; the in-memory copy stays authoritative.
    fn persist(&self) {
        let kv = self.kv.as_ref();
        if let Err(e) = save_json(kv, POLL_RESPONSES_KEY, &self.responses) {
            error!(error = %e, "could not persist poll responses");
        }
        if let Err(e) = save_json(kv, SUBMITTED_POLLS_KEY, &self.submitted) {
            error!(error = %e, "could not persist submitted polls");
        }
        if let Err(e) = save_json(kv, DEMOGRAPHICS_KEY, &self.demographics) {
            error!(error = %e, "could not persist demographics");
        }
    }
}
