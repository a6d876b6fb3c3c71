use axum::{
    routing::{get, post},
    Router,
};

use crate::controllers::poll_controller::{
    can_user_vote, cast_vote, get_all_polls, get_poll_by_id, get_poll_live_results,
    get_poll_result,
};

pub fn poll_router() -> Router {
    Router::new()
        .route("/", get(get_all_polls))
        .route("/{poll_id}", get(get_poll_by_id))
        .route("/{poll_id}/vote", post(cast_vote))
        .route("/{poll_id}/can-vote", get(can_user_vote))
        .route("/{poll_id}/results", get(get_poll_result))
        .route("/{poll_id}/results/live", get(get_poll_live_results))
}
