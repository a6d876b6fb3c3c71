use axum::{extract::Query, Extension, Json};

use crate::{
    config::startup::AppContext,
    dtos::{requests::ResultQueryParams, responses::ApiResponse},
    error::AppError,
    models::stats::{
        CompleteExport, CountryCount, FilteredExport, PollStatistics, StatsSnapshot, VoterPin,
    },
    services::stats::StatsService,
};

//*GET:: api/stats
pub async fn get_stats(
    Extension(ctx): Extension<AppContext>,
) -> Result<Json<ApiResponse<StatsSnapshot>>, AppError> {
    let snapshot = StatsService::new(&ctx).snapshot().await;
    Ok(Json(ApiResponse::ok("Stats fetched successfully", snapshot)))
}

//*GET:: api/stats/countries
pub async fn get_country_stats(
    Extension(ctx): Extension<AppContext>,
    Query(query): Query<ResultQueryParams>,
) -> Result<Json<ApiResponse<Vec<CountryCount>>>, AppError> {
    let countries = StatsService::new(&ctx).countries(&query.filters()).await;
    Ok(Json(ApiResponse::ok(
        "Country breakdown fetched successfully",
        countries,
    )))
}

//*GET:: api/stats/voters
pub async fn get_voters(
    Extension(ctx): Extension<AppContext>,
) -> Result<Json<ApiResponse<Vec<VoterPin>>>, AppError> {
    let voters = StatsService::new(&ctx).voters().await;
    Ok(Json(ApiResponse::ok("Voters fetched successfully", voters)))
}

//*GET:: api/stats/summary
pub async fn get_summary(
    Extension(ctx): Extension<AppContext>,
) -> Result<Json<ApiResponse<PollStatistics>>, AppError> {
    let summary = StatsService::new(&ctx).summary().await;
    Ok(Json(ApiResponse::ok("Statistics fetched successfully", summary)))
}

//*GET:: api/export
pub async fn export_responses(
    Extension(ctx): Extension<AppContext>,
    Query(query): Query<ResultQueryParams>,
) -> Result<Json<ApiResponse<FilteredExport>>, AppError> {
    let export = StatsService::new(&ctx).export(query.filters()).await;
    Ok(Json(ApiResponse::ok("Responses exported successfully", export)))
}

//*GET:: api/export/complete
pub async fn export_complete(
    Extension(ctx): Extension<AppContext>,
) -> Result<Json<ApiResponse<CompleteExport>>, AppError> {
    let export = StatsService::new(&ctx).complete_export().await;
    Ok(Json(ApiResponse::ok("Complete export generated successfully", export)))
}
