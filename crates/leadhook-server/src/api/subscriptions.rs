use crate::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use leadhook_core::models::{CreateSubscription, UpdateSubscription, WebhookSubscription};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route(
            "/api/subscriptions/{name}",
            get(get_subscription)
                .put(update_subscription)
                .delete(delete_subscription),
        )
}

async fn list_subscriptions(
    State(state): State<AppState>,
) -> Result<Json<Vec<WebhookSubscription>>, ApiError> {
    Ok(Json(state.subscriptions.list().await?))
}

async fn create_subscription(
    State(state): State<AppState>,
    Json(input): Json<CreateSubscription>,
) -> Result<(StatusCode, Json<WebhookSubscription>), ApiError> {
    let sub = state.subscriptions.create(input).await?;
    Ok((StatusCode::CREATED, Json(sub)))
}

async fn get_subscription(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<WebhookSubscription>, ApiError> {
    Ok(Json(state.subscriptions.get(&name).await?))
}

async fn update_subscription(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(input): Json<UpdateSubscription>,
) -> Result<Json<WebhookSubscription>, ApiError> {
    Ok(Json(state.subscriptions.update(&name, input).await?))
}

async fn delete_subscription(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.subscriptions.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
