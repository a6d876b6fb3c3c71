use std::net::SocketAddr;

use anyhow::Context;
use config::{
    cors::init_cors, logger::initialize_logger, session::init_session, settings::Settings,
    startup::AppContext,
};
use tracing::info;

mod app;
mod config;
mod controllers;
mod dtos;
mod error;
mod models;
mod repositories;
mod routes;
mod services;

#[cfg(test)]
mod tests;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    initialize_logger()?;

    info!("🚀 Server starting initialization...");

    let settings = Settings::from_env()?;
    let bind_addr = settings.bind_addr.clone();
    let cors = init_cors(&settings.cors_origin)?;

    let ctx = AppContext::init(settings).await?;
    let session_layer = init_session(&ctx.settings, ctx.kv.clone());
    let app = app::create_app(ctx.clone(), session_layer).layer(cors);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!("🚀 Server started successfully at {bind_addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    ctx.shutdown().await;
    Ok(())
}
