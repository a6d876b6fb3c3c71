use axum::{Extension, Router};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::{
    config::startup::AppContext,
    routes::{admin_route::admin_router, poll_route::poll_router, stats_route::stats_router},
};

pub fn create_app<S>(ctx: AppContext, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    Router::new()
        .nest("/api/polls", poll_router())
        .nest("/api/admin", admin_router())
        .nest("/api", stats_router())
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(ctx))
}
