use axum::http::{
    header::{ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE},
    HeaderValue, Method,
};
use tower_http::cors::CorsLayer;

pub fn init_cors(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin = origin
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("CORS_ORIGIN {origin:?} is not a valid header value: {e}"))?;

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT, SET_COOKIE, COOKIE])
        .allow_credentials(true)
        .allow_origin([origin])
        .expose_headers([SET_COOKIE]);

    Ok(cors)
}
