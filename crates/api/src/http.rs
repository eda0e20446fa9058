//! HTTP surface
//!
//! Two routes, both POST: `/req/:account` runs a mixed request,
//! `/watch/:account` long-polls a KV version. The engine blocks its
//! worker (lock waits, durability barrier, watch), so handlers hop to
//! the blocking pool and the async side stays responsive. Every engine
//! failure becomes a 400 with the error's display string as a
//! plain-text body; unmatched routes get an empty 404.

use crate::config::Config;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use latch_core::error::{Error, Result};
use latch_engine::{Coordinator, Request, Response, WatchRequest};
use std::sync::Arc;
use tracing::info;

/// Shared state behind the HTTP handlers
pub struct AppContext {
    /// The request engine
    pub coordinator: Arc<Coordinator>,
    /// Watch deadline handed to the engine
    pub watch_timeout_s: i64,
}

/// Build the router over the shared context
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/req/:account", post(handle_request))
        .route("/watch/:account", post(handle_watch))
        .fallback(not_found)
        .with_state(ctx)
}

async fn handle_request(
    State(ctx): State<Arc<AppContext>>,
    Path(account): Path<String>,
    Json(req): Json<Request>,
) -> std::result::Result<Json<Response>, ApiError> {
    let coordinator = Arc::clone(&ctx.coordinator);
    let result = tokio::task::spawn_blocking(move || coordinator.execute(&account, &req))
        .await
        .map_err(|e| ApiError(Error::storage(format!("request worker failed: {e}"))))?;
    result.map(Json).map_err(ApiError)
}

async fn handle_watch(
    State(ctx): State<Arc<AppContext>>,
    Path(account): Path<String>,
    Json(req): Json<WatchRequest>,
) -> std::result::Result<Json<latch_engine::KvReply>, ApiError> {
    let coordinator = Arc::clone(&ctx.coordinator);
    let timeout_s = ctx.watch_timeout_s;
    let result = tokio::task::spawn_blocking(move || coordinator.watch(&account, &req, timeout_s))
        .await
        .map_err(|e| ApiError(Error::storage(format!("watch worker failed: {e}"))))?;
    result.map(Json).map_err(ApiError)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

// Engine errors surface uniformly as 400 + plain-text reason; clients
// match on the body ("not_locked", "no change", "DB stopped", ...)
struct ApiError(Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::BAD_REQUEST, self.0.to_string()).into_response()
    }
}

/// Bind and serve until interrupted
///
/// Returns once the graceful shutdown completes; the caller still owns
/// the flusher drain.
pub async fn serve(config: &Config, coordinator: Arc<Coordinator>) -> Result<()> {
    let ctx = Arc::new(AppContext {
        coordinator,
        watch_timeout_s: config.watch_timeout_s,
    });
    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
