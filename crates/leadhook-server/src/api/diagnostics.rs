use crate::{ApiError, AppState, Ctx};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

const LOG_WINDOW: usize = 100;
const RECENT_LOGS: usize = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/webhook/status", get(webhook_status))
        .route("/api/webhook/logs", get(webhook_logs))
        .route("/api/webhook/test-log", post(test_log))
}

async fn webhook_status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let settings = state.db.get_settings().await?;
    let webhook_url = settings
        .webhook_callback_url
        .clone()
        .unwrap_or_else(|| state.config.webhook_url());

    Ok(Json(json!({
        "webhook_url": webhook_url,
        "verify_token": settings.verify_token,
        "is_active": settings.webhook_is_active,
        "enabled": settings.enabled,
    })))
}

async fn webhook_logs(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> Result<Json<Value>, ApiError> {
    let log = state.site_logger(&ctx.site);
    let tail = log
        .tail(LOG_WINDOW, RECENT_LOGS)
        .map_err(|e| ApiError::internal(format!("Failed to read meta log: {e}")))?;

    let Some(tail) = tail else {
        return Ok(Json(json!({ "error": "No log files found" })));
    };

    Ok(Json(json!({
        "log_file": log.path().display().to_string(),
        "site_name": log.site(),
        "total_lines": tail.total_lines,
        "webhook_entries": tail.webhook_entries,
        "recent_webhook_logs": tail.recent_webhook_logs,
        "log_type": "site_specific_meta_log",
    })))
}

async fn test_log(State(state): State<AppState>, Ctx(ctx): Ctx) -> Json<Value> {
    let log = state.site_logger(&ctx.site);
    log.info(format!("Test log entry from {}", ctx.user));
    log.warning("Test warning entry");
    log.error("Test error entry");

    let path = log.path();
    Json(json!({
        "meta_log_file": path.display().to_string(),
        "site_name": log.site(),
        "file_exists": path.exists(),
        "test_logs_written": true,
    }))
}
