use axum::{routing::get, Router};

use crate::controllers::stats_controller::{
    export_complete, export_responses, get_country_stats, get_stats, get_summary, get_voters,
};

pub fn stats_router() -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/stats/countries", get(get_country_stats))
        .route("/stats/voters", get(get_voters))
        .route("/stats/summary", get(get_summary))
        .route("/export", get(export_responses))
        .route("/export/complete", get(export_complete))
}
