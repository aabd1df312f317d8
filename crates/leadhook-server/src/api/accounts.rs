use crate::{ApiError, AppState};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use leadhook_core::accounts;
use leadhook_core::models::{FormList, Page, SyncReport};
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/accounts", get(list_pages))
        .route("/api/accounts/sync", post(sync_pages))
        .route("/api/accounts/{page_id}/forms", get(list_forms))
}

#[derive(Deserialize)]
struct FormQuery {
    after: Option<String>,
}

async fn list_pages(State(state): State<AppState>) -> Result<Json<Vec<Page>>, ApiError> {
    Ok(Json(state.db.list_pages().await?))
}

async fn sync_pages(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
    let report = accounts::sync_pages(&state.db, state.graph.as_ref()).await?;
    Ok(Json(report))
}

async fn list_forms(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Query(query): Query<FormQuery>,
) -> Result<Json<FormList>, ApiError> {
    let forms = accounts::list_forms(
        &state.db,
        state.graph.as_ref(),
        &page_id,
        query.after.as_deref(),
    )
    .await?;
    Ok(Json(forms))
}
