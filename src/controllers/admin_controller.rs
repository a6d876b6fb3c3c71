use axum::{extract::Path, Extension, Json};
use tracing::info;

use crate::{
    config::startup::AppContext,
    dtos::{
        requests::{DurationRequest, EndDateRequest, GlobalVotingRequest},
        responses::{ApiResponse, ClearedDTO, GlobalVotingDTO, LifecycleStatusDTO},
    },
    error::{AppError, PollsError},
    models::lifecycle::PollStatus,
    services::stats::StatsService,
};

fn ensure_known(ctx: &AppContext, poll_id: &str) -> Result<(), AppError> {
    ctx.catalog
        .get(poll_id)
        .map(|_| ())
        .ok_or(AppError::Poll(PollsError::PollNotFound))
}

async fn transition(
    ctx: &AppContext,
    poll_id: String,
    status: PollStatus,
) -> Result<LifecycleStatusDTO, AppError> {
    ensure_known(ctx, &poll_id)?;
    let mut lifecycle = ctx.lifecycle.lock().await;
    lifecycle.set_status(&poll_id, status)?;
    let view = lifecycle.view(&poll_id);
    Ok(LifecycleStatusDTO { poll_id, view })
}

//*GET:: api/admin/polls
pub async fn list_poll_statuses(
    Extension(ctx): Extension<AppContext>,
) -> Result<Json<ApiResponse<Vec<LifecycleStatusDTO>>>, AppError> {
    let mut lifecycle = ctx.lifecycle.lock().await;
    let statuses = ctx
        .catalog
        .polls()
        .iter()
        .map(|poll| LifecycleStatusDTO {
            poll_id: poll.id.clone(),
            view: lifecycle.view(&poll.id),
        })
        .collect();

    Ok(Json(ApiResponse::ok("Poll statuses fetched successfully", statuses)))
}

//?POST:: api/admin/polls/poll_id/activate
pub async fn activate_poll(
    Extension(ctx): Extension<AppContext>,
    Path(poll_id): Path<String>,
) -> Result<Json<ApiResponse<LifecycleStatusDTO>>, AppError> {
    let status = transition(&ctx, poll_id, PollStatus::Active).await?;
    Ok(Json(ApiResponse::ok("Poll activated successfully", status)))
}

//?POST:: api/admin/polls/poll_id/pause
pub async fn pause_poll(
    Extension(ctx): Extension<AppContext>,
    Path(poll_id): Path<String>,
) -> Result<Json<ApiResponse<LifecycleStatusDTO>>, AppError> {
    let status = transition(&ctx, poll_id, PollStatus::Paused).await?;
    Ok(Json(ApiResponse::ok("Poll paused successfully", status)))
}

//?POST:: api/admin/polls/poll_id/end
pub async fn end_poll(
    Extension(ctx): Extension<AppContext>,
    Path(poll_id): Path<String>,
) -> Result<Json<ApiResponse<LifecycleStatusDTO>>, AppError> {
    let status = transition(&ctx, poll_id, PollStatus::Ended).await?;
    Ok(Json(ApiResponse::ok("Poll ended successfully", status)))
}

//?PUT:: api/admin/polls/poll_id/end-date
pub async fn set_poll_end_date(
    Extension(ctx): Extension<AppContext>,
    Path(poll_id): Path<String>,
    Json(payload): Json<EndDateRequest>,
) -> Result<Json<ApiResponse<LifecycleStatusDTO>>, AppError> {
    ensure_known(&ctx, &poll_id)?;
    let mut lifecycle = ctx.lifecycle.lock().await;
    lifecycle.set_end_date(&poll_id, payload.end_date);
    let view = lifecycle.view(&poll_id);

    Ok(Json(ApiResponse::ok(
        "Poll end date updated successfully",
        LifecycleStatusDTO { poll_id, view },
    )))
}

//?PUT:: api/admin/polls/poll_id/duration
pub async fn set_poll_duration(
    Extension(ctx): Extension<AppContext>,
    Path(poll_id): Path<String>,
    Json(payload): Json<DurationRequest>,
) -> Result<Json<ApiResponse<LifecycleStatusDTO>>, AppError> {
    ensure_known(&ctx, &poll_id)?;
    let mut lifecycle = ctx.lifecycle.lock().await;
    lifecycle.set_duration(&poll_id, payload.days)?;
    let view = lifecycle.view(&poll_id);

    Ok(Json(ApiResponse::ok(
        "Poll duration updated successfully",
        LifecycleStatusDTO { poll_id, view },
    )))
}

//?PUT:: api/admin/voting
pub async fn set_global_voting(
    Extension(ctx): Extension<AppContext>,
    Json(payload): Json<GlobalVotingRequest>,
) -> Result<Json<ApiResponse<GlobalVotingDTO>>, AppError> {
    ctx.lifecycle
        .lock()
        .await
        .set_global_voting(payload.allow_voting);
    ctx.notify_refresh();

    Ok(Json(ApiResponse::ok(
        "Global voting updated successfully",
        GlobalVotingDTO {
            allow_voting: payload.allow_voting,
        },
    )))
}

//*DELETE:: api/admin/responses
pub async fn clear_responses(
    Extension(ctx): Extension<AppContext>,
) -> Result<Json<ApiResponse<ClearedDTO>>, AppError> {
    let removed = {
        let mut store = ctx.store.write().await;
        let removed = store.responses().len();
        store.clear();
        removed
    };
    info!(removed, "local responses cleared");
    StatsService::new(&ctx).refresh_local().await;
    ctx.notify_refresh();

    Ok(Json(ApiResponse::ok(
        "Responses cleared successfully",
        ClearedDTO { removed },
    )))
}
