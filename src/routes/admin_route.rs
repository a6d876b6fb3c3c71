use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::controllers::admin_controller::{
    activate_poll, clear_responses, end_poll, list_poll_statuses, pause_poll, set_global_voting,
    set_poll_duration, set_poll_end_date,
};

/// Unauthenticated; expose only on a trusted network.
pub fn admin_router() -> Router {
    Router::new()
        .route("/polls", get(list_poll_statuses))
        .route("/polls/{poll_id}/activate", post(activate_poll))
        .route("/polls/{poll_id}/pause", post(pause_poll))
        .route("/polls/{poll_id}/end", post(end_poll))
        .route("/polls/{poll_id}/end-date", put(set_poll_end_date))
        .route("/polls/{poll_id}/duration", put(set_poll_duration))
        .route("/voting", put(set_global_voting))
        .route("/responses", delete(clear_responses))
}
