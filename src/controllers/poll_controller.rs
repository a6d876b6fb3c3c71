use std::{convert::Infallible, net::SocketAddr, time::Duration};

use axum::{
    extract::{ConnectInfo, Path, Query},
    http::{Extensions, HeaderMap},
    response::{sse::Event, Sse},
    Extension, Json,
};
use axum_extra::{headers, TypedHeader};
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::{
    config::startup::AppContext,
    dtos::{
        requests::{ResultQueryParams, ResultSource, VoteRequest},
        responses::{ApiResponse, CanVoteDTO, PollResponseDTO, VoteResultDTO},
    },
    error::{AppError, PollsError, SyncError},
    models::{
        aggregate::{AggregateResult, FilterSet},
        lifecycle::DuplicateVotePolicy,
    },
    repositories::response_repository::SessionIndex,
    services::{
        aggregator::Aggregator,
        identity::{existing_voter_session_id, voter_session_id},
        voting::{VoteInput, VoteService},
    },
};

/// Proxy headers first, then the peer address of the connection itself.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}

fn accept_language(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

//*GET:: api/polls
pub async fn get_all_polls(
    Extension(ctx): Extension<AppContext>,
) -> Result<Json<ApiResponse<Vec<PollResponseDTO>>>, AppError> {
    let mut lifecycle = ctx.lifecycle.lock().await;
    let polls = ctx
        .catalog
        .polls()
        .iter()
        .map(|poll| PollResponseDTO::new(poll, lifecycle.view(&poll.id)))
        .collect();

    Ok(Json(ApiResponse::ok("All polls fetched successfully", polls)))
}

//*GET:: api/polls/poll_id
pub async fn get_poll_by_id(
    Extension(ctx): Extension<AppContext>,
    Path(poll_id): Path<String>,
) -> Result<Json<ApiResponse<PollResponseDTO>>, AppError> {
    let poll = ctx.catalog.get(&poll_id).ok_or(PollsError::PollNotFound)?;
    let view = ctx.lifecycle.lock().await.view(&poll_id);

    Ok(Json(ApiResponse::ok(
        "Poll retrieved successfully",
        PollResponseDTO::new(poll, view),
    )))
}

//?POST:: api/polls/poll_id/vote
pub async fn cast_vote(
    Extension(ctx): Extension<AppContext>,
    Path(poll_id): Path<String>,
    session: Session,
    user_agent: Option<TypedHeader<headers::UserAgent>>,
    headers: HeaderMap,
    extensions: Extensions,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<ApiResponse<VoteResultDTO>>, AppError> {
    let session_id = voter_session_id(&session).await?;
    let input = VoteInput {
        option: payload.option,
        timezone: payload.timezone,
        language: payload.language.or_else(|| accept_language(&headers)),
        user_agent: user_agent.map(|TypedHeader(agent)| agent.to_string()),
        ip: client_ip(&headers, &extensions),
    };

    let receipt = VoteService::new(&ctx)
        .cast_vote(&poll_id, &session_id, input)
        .await?;

    Ok(Json(ApiResponse::ok(
        "Vote cast successfully",
        VoteResultDTO {
            poll_id: receipt.response.poll_id,
            selected_option: receipt.response.selected_option,
            session_id: receipt.response.session_id,
            timestamp: receipt.response.timestamp,
            demographics_completed: receipt.demographics_completed,
            results: receipt.results,
        },
    )))
}

//*GET:: api/polls/poll_id/can-vote
pub async fn can_user_vote(
    Extension(ctx): Extension<AppContext>,
    Path(poll_id): Path<String>,
    session: Session,
) -> Result<Json<ApiResponse<CanVoteDTO>>, AppError> {
    if ctx.catalog.get(&poll_id).is_none() {
        return Err(PollsError::PollNotFound.into());
    }

    let gate = ctx.lifecycle.lock().await.check_accepts_votes(&poll_id);
    let submitted = match existing_voter_session_id(&session).await? {
        Some(session_id) => ctx
            .store
            .read()
            .await
            .submitted(&session_id, &poll_id)
            .cloned(),
        None => None,
    };
    let gate = match gate {
        Ok(())
            if submitted.is_some()
                && ctx.settings.duplicate_votes == DuplicateVotePolicy::Reject =>
        {
            Err(PollsError::AlreadyVoted)
        }
        other => other,
    };

    let message = if gate.is_ok() { "Can vote" } else { "Cannot vote" };
    Ok(Json(ApiResponse::ok(
        message,
        CanVoteDTO {
            poll_id,
            can_vote: gate.is_ok(),
            reason: gate.err().map(|e| e.to_string()),
            submitted,
        },
    )))
}

async fn compute_results(
    ctx: &AppContext,
    poll_id: &str,
    source: ResultSource,
    filters: &FilterSet,
) -> Result<AggregateResult, AppError> {
    match source {
        ResultSource::Local => {
            let store = ctx.store.read().await;
            Ok(Aggregator::new(&ctx.catalog, store.index()).aggregate(
                poll_id,
                store.responses(),
                filters,
            )?)
        }
        ResultSource::Remote => {
            let collector = ctx.collector.as_ref().ok_or(SyncError::NotConfigured)?;
            let records = collector.fetch_raw().await?;
            let index = SessionIndex::build(ctx.catalog.demographics(), &records);
            Ok(Aggregator::new(&ctx.catalog, &index).aggregate(poll_id, &records, filters)?)
        }
    }
}

//*GET:: api/polls/poll_id/results
pub async fn get_poll_result(
    Extension(ctx): Extension<AppContext>,
    Path(poll_id): Path<String>,
    Query(query): Query<ResultQueryParams>,
) -> Result<Json<ApiResponse<AggregateResult>>, AppError> {
    let result = compute_results(&ctx, &poll_id, query.source(), &query.filters()).await?;

    Ok(Json(ApiResponse::ok(
        "Poll results retrieved successfully",
        result,
    )))
}

//*GET:: api/polls/poll_id/results/live
pub async fn get_poll_live_results(
    Extension(ctx): Extension<AppContext>,
    Path(poll_id): Path<String>,
    Query(query): Query<ResultQueryParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if ctx.catalog.get(&poll_id).is_none() {
        return Err(PollsError::PollNotFound.into());
    }
    Ok(start_sse(ctx, poll_id, query))
}

/// Emits the aggregate once on connect and again after every append or
/// status change.
pub fn start_sse(
    ctx: AppContext,
    poll_id: String,
    query: ResultQueryParams,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filters = query.filters();
    let source = query.source();
    let stream = WatchStream::new(ctx.refresh.subscribe()).then(move |revision| {
        let ctx = ctx.clone();
        let poll_id = poll_id.clone();
        let filters = filters.clone();

        async move {
            let event = match compute_results(&ctx, &poll_id, source, &filters).await {
                Ok(result) => Event::default()
                    .event("poll-update")
                    .id(revision.to_string())
                    .json_data(&result)
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "could not encode live results");
                        Event::default().event("error").data("Error encoding poll results")
                    }),
                Err(e) => {
                    debug!(%poll_id, error = %e, "live results unavailable");
                    Event::default()
                        .event("error")
                        .data("Error fetching poll results")
                }
            };
            Ok(event)
        }
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive-text"),
    )
}
