use crate::error::render_page;
use crate::{ApiError, AppState, Ctx, ErrorPage};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use leadhook_core::oauth::{self, AuthorizationRequest, CallbackOutcome, CallbackParams, ReauthorizeRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/oauth/authorize", get(authorize))
        .route("/api/oauth/callback", get(callback))
        .route("/api/oauth/refresh", post(refresh))
}

async fn authorize(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> Result<Json<AuthorizationRequest>, ApiError> {
    let settings = state.db.get_settings().await?;
    let auth = oauth::authorization_request(
        &settings,
        &state.config.oauth_redirect_uri(),
        &state.oauth_states,
        &ctx,
    )?;
    Ok(Json(auth))
}

async fn refresh(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> Result<Json<ReauthorizeRequest>, ApiError> {
    let settings = state.db.get_settings().await?;
    let request = oauth::refresh_request(
        &settings,
        &state.config.oauth_redirect_uri(),
        &state.oauth_states,
        &ctx,
    )?;
    Ok(Json(request))
}

async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ErrorPage> {
    let outcome = oauth::handle_callback(
        &state.db,
        state.graph.as_ref(),
        &state.oauth_states,
        &state.config.oauth_redirect_uri(),
        params,
    )
    .await?;

    let page = match outcome {
        CallbackOutcome::Denied { error, description } => {
            tracing::warn!(%error, "OAuth authorization denied");
            ErrorPage::new(
                StatusCode::BAD_REQUEST,
                "Authorization Failed",
                description.unwrap_or(error),
            )
            .into_response()
        }
        CallbackOutcome::InvalidAccess => ErrorPage::new(
            StatusCode::BAD_REQUEST,
            "Invalid Access",
            "Missing authorization code or state",
        )
        .into_response(),
        CallbackOutcome::InvalidState => ErrorPage::new(
            StatusCode::BAD_REQUEST,
            "Invalid State",
            "The authorization request has expired or was already used. Please start again.",
        )
        .into_response(),
        CallbackOutcome::Authorized { token_expiry } => {
            let expiry = token_expiry
                .map(|t| format!("Token expires at {}", t.format("%Y-%m-%d %H:%M:%S UTC")))
                .unwrap_or_else(|| "Token is long-lived".to_string());
            render_page(
                "Authorization Successful",
                &format!("Facebook access token saved. {expiry}."),
            )
            .into_response()
        }
    };

    Ok(page)
}
