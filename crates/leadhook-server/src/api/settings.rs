use crate::{ApiError, AppState};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use leadhook_core::models::{Settings, TokenStatus, UpdateSettings};
use leadhook_core::settings::{self, RegeneratedToken};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/settings", get(get_settings).put(update_settings))
        .route(
            "/api/settings/regenerate-verify-token",
            post(regenerate_verify_token),
        )
        .route("/api/settings/token-status", get(token_status))
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, ApiError> {
    let settings = state.db.get_settings().await?;
    Ok(Json(settings.redacted()))
}

async fn update_settings(
    State(state): State<AppState>,
    Json(input): Json<UpdateSettings>,
) -> Result<Json<Settings>, ApiError> {
    let settings = settings::update_settings(&state.db, input, &state.config.webhook_url()).await?;
    Ok(Json(settings.redacted()))
}

async fn regenerate_verify_token(
    State(state): State<AppState>,
) -> Result<Json<RegeneratedToken>, ApiError> {
    Ok(Json(settings::regenerate_verify_token(&state.db).await?))
}

async fn token_status(State(state): State<AppState>) -> Result<Json<TokenStatus>, ApiError> {
    let current = state.db.get_settings().await?;
    Ok(Json(settings::token_status(&current, Utc::now())?))
}
