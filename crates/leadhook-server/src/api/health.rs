use crate::{ApiError, AppState};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use leadhook_core::models::ServerStatus;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
}

async fn health() -> &'static str {
    "ok"
}

async fn status(State(state): State<AppState>) -> Result<Json<ServerStatus>, ApiError> {
    let settings = state.db.get_settings().await?;
    let total_leads = state.db.count_leads().await?;
    let active_subscriptions = state.db.count_active_subscriptions().await? as usize;

    Ok(Json(ServerStatus {
        instance_name: state.config.instance.name.clone(),
        site: state.config.instance.site.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        enabled: settings.enabled,
        webhook_is_active: settings.webhook_is_active,
        total_leads,
        active_subscriptions,
    }))
}
