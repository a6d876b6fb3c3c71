use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{
        aggregate::AggregateResult,
        lifecycle::{PollStatus, TimeRemaining},
        poll::PollDefinition,
        response::SubmittedPoll,
    },
    services::lifecycle::LifecycleView,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK.as_u16() as i32,
            message: message.into(),
            data: Some(data),
            timestamp: Utc::now(),
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponseDTO {
    pub poll_id: String,
    pub question: String,
    pub category: String,
    pub options: Vec<String>,
    pub status: PollStatus,
    pub is_active: bool,
    pub time_remaining: Option<TimeRemaining>,
    pub end_date: Option<DateTime<Utc>>,
}

impl PollResponseDTO {
    pub fn new(poll: &PollDefinition, view: LifecycleView) -> Self {
        Self {
            poll_id: poll.id.clone(),
            question: poll.question.clone(),
            category: poll.category.clone(),
            options: poll.options.clone(),
            status: view.status,
            is_active: view.is_active,
            time_remaining: view.time_remaining,
            end_date: view.end_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanVoteDTO {
    pub poll_id: String,
    pub can_vote: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted: Option<SubmittedPoll>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResultDTO {
    pub poll_id: String,
    pub selected_option: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub demographics_completed: bool,
    pub results: AggregateResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleStatusDTO {
    pub poll_id: String,
    #[serde(flatten)]
    pub view: LifecycleView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalVotingDTO {
    pub allow_voting: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedDTO {
    pub removed: usize,
}
