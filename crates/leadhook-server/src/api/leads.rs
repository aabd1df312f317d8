use crate::{ApiError, AppState};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use leadhook_core::error::LeadAdsError;
use leadhook_core::lead_details;
use leadhook_core::models::Lead;
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/leads", get(list_leads))
        .route("/api/leads/{leadgen_id}", get(get_lead))
        .route("/api/leads/{leadgen_id}/details", get(get_lead_details))
}

#[derive(Deserialize)]
struct LeadQuery {
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct DetailsQuery {
    simplify: Option<bool>,
}

async fn list_leads(
    State(state): State<AppState>,
    Query(query): Query<LeadQuery>,
) -> Result<Json<Vec<Lead>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(state.db.list_leads(limit).await?))
}

async fn get_lead(
    State(state): State<AppState>,
    Path(leadgen_id): Path<String>,
) -> Result<Json<Lead>, ApiError> {
    let lead = state
        .db
        .get_lead(&leadgen_id)
        .await?
        .ok_or_else(|| LeadAdsError::NotFound(format!("Lead {leadgen_id}")))?;
    Ok(Json(lead))
}

async fn get_lead_details(
    State(state): State<AppState>,
    Path(leadgen_id): Path<String>,
    Query(query): Query<DetailsQuery>,
) -> Result<Json<Value>, ApiError> {
    let details = lead_details::fetch_lead_details(
        &state.db,
        state.graph.as_ref(),
        &leadgen_id,
        query.simplify.unwrap_or(true),
    )
    .await?;
    Ok(Json(details))
}
