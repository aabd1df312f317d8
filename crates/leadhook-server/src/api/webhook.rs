use crate::{ApiError, AppState, Ctx, ErrorPage};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use leadhook_core::context::RequestContext;
use leadhook_core::error::LeadAdsError;
use leadhook_core::ingest;
use leadhook_core::meta_log::SiteLogger;
use leadhook_core::verification::{self, VerificationRequest};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/webhook", get(verify).post(receive))
}

/// Subscription handshake. Answers with the bare challenge on success.
async fn verify(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<String, ErrorPage> {
    let log = state.site_logger(&ctx.site);
    log_request(&log, "GET", &headers, &query, &ctx);

    let req = VerificationRequest {
        mode: query.get("hub.mode").cloned(),
        verify_token: query.get("hub.verify_token").cloned(),
        challenge: query.get("hub.challenge").cloned(),
    };

    Ok(verification::verify_subscription(&state.db, &log, &req).await?)
}

async fn receive(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let log = state.site_logger(&ctx.site);
    log_request(&log, "POST", &headers, &query, &ctx);

    let payload = match ingest::parse_body(&body) {
        Ok(payload) => payload,
        Err(e) => {
            log.error("Invalid payload received");
            return Err(e.into());
        }
    };
    log.info(format!(
        "Facebook Lead Event received: {}",
        serde_json::to_string_pretty(&payload).unwrap_or_default()
    ));

    if state.config.webhook.require_signature {
        check_signature(&state, &log, &headers, &body).await?;
    }

    match ingest::process_payload(&state.db, &log, &state.events, &ctx, &payload).await {
        Ok(_) => Ok(Json(json!({ "success": true }))),
        Err(e) => {
            log.error(format!("Error processing Facebook Lead Event: {e}"));
            Err(ApiError::internal(e.to_string()))
        }
    }
}

async fn check_signature(
    state: &AppState,
    log: &SiteLogger,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), ApiError> {
    let settings = state.db.get_settings().await?;
    let secret = settings
        .app_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            LeadAdsError::Configuration("App Secret must be configured".to_string())
        })?;

    let valid = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|sig| verification::verify_signature(secret, body, sig));

    if !valid {
        log.error("Signature check failed");
        return Err(LeadAdsError::Signature.into());
    }
    Ok(())
}

fn log_request(
    log: &SiteLogger,
    method: &str,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    ctx: &RequestContext,
) {
    let header_map: BTreeMap<&str, &str> = headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|val| (k.as_str(), val)))
        .collect();
    let query: BTreeMap<_, _> = query.iter().collect();
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    log.info(format!("=== Facebook Webhook {method} Request ==="));
    log.info(format!("Request method: {method}"));
    log.info(format!("Request headers: {header_map:?}"));
    log.info(format!("Request args: {query:?}"));
    log.info(format!("User agent: {user_agent}"));
    log.info(format!(
        "Remote address: {}",
        ctx.remote_addr.as_deref().unwrap_or("unknown")
    ));
}
