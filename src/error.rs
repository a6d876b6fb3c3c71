use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // Session Errors
    #[error("Invalid session state: {0}")]
    InvalidSessionState(#[from] tower_sessions::session::Error),

    // Local Store Errors
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    // Remote Collector Errors
    #[error("Remote collector error: {0}")]
    Remote(#[from] SyncError),

    // Poll Errors
    #[error("Poll error: {0}")]
    Poll(#[from] PollsError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollsError {
    #[error("Poll not found")]
    PollNotFound,

    #[error("Invalid vote: {0}")]
    InvalidVote(String),

    #[error("No option selected")]
    NoOptionSelected,

    #[error("Voting is currently disabled site-wide")]
    VotingDisabled,

    #[error("Poll is currently paused")]
    PollPaused,

    #[error("Poll has already ended")]
    PollEnded,

    #[error("Poll is not accepting votes")]
    PollClosed,

    #[error("This session has already voted on this poll")]
    AlreadyVoted,

    #[error("Cannot modify ended poll")]
    CannotModifyClosed,

    #[error("Invalid poll dates: {0}")]
    InvalidPollDates(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Stored document `{key}` is corrupt: {reason}")]
    ConfigCorrupt { key: String, reason: String },

    #[error("Local store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Delivery to `{channel}` failed: {reason}")]
    RemoteDeliveryFailure { channel: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote endpoint answered with status {0}")]
    Status(u16),

    #[error("No remote collector is configured")]
    NotConfigured,
}

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("All geolocation providers failed")]
    GeolocationUnavailable,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_string = self.to_string();
        let (status, error_message) = match self {
            AppError::InvalidSessionState(_) => (StatusCode::BAD_REQUEST, "Invalid Session State"),

            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Storage Error"),

            AppError::Remote(remote_err) => match remote_err {
                SyncError::NotConfigured => {
                    (StatusCode::SERVICE_UNAVAILABLE, "Remote Collector Not Configured")
                }
                _ => (StatusCode::BAD_GATEWAY, "Remote Collector Unavailable"),
            },

            AppError::Poll(poll_err) => match poll_err {
                PollsError::PollNotFound => (StatusCode::NOT_FOUND, "Poll Not Found"),
                PollsError::InvalidVote(_) => (StatusCode::BAD_REQUEST, "Invalid Vote"),
                PollsError::NoOptionSelected => {
                    (StatusCode::BAD_REQUEST, "Please Select An Option Before Submitting")
                }
                PollsError::VotingDisabled => {
                    (StatusCode::FORBIDDEN, "Voting Is Currently Disabled Site-Wide")
                }
                PollsError::PollPaused => {
                    (StatusCode::FORBIDDEN, "Voting Is Temporarily Paused For This Poll")
                }
                PollsError::PollEnded => (StatusCode::FORBIDDEN, "Voting Has Ended For This Poll"),
                PollsError::PollClosed => {
                    (StatusCode::FORBIDDEN, "This Poll Is Not Currently Accepting Votes")
                }
                PollsError::AlreadyVoted => (StatusCode::CONFLICT, "Already Voted On This Poll"),
                PollsError::CannotModifyClosed => {
                    (StatusCode::CONFLICT, "Cannot Modify Ended Poll")
                }
                PollsError::InvalidPollDates(_) => (StatusCode::BAD_REQUEST, "Invalid Poll Dates"),
            },
        };

        let body = Json(json!({
            "status": status.as_u16(),
            "message": error_message,
            "error": error_string,
            "timestamp": chrono::Utc::now()
        }));

        (status, body).into_response()
    }
}
