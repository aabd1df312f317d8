//! OAuth authorization-code flow against the platform.

use crate::context::RequestContext;
use crate::db::Database;
use crate::error::{LeadAdsError, Result};
use crate::generate_token;
use crate::graph::GraphApi;
use crate::models::Settings;
use crate::settings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const STATE_TTL: Duration = Duration::from_secs(600);
const STATE_LEN: usize = 32;

/// Pending `state` values issued with authorization URLs, each bound to
/// the user that started the flow.
#[derive(Debug)]
pub struct OAuthStateStore {
    ttl: Duration,
    states: Mutex<HashMap<String, (String, Instant)>>,
}

impl OAuthStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue(&self, user: &str) -> String {
        let state = generate_token(STATE_LEN);
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        states.retain(|_, (_, expires)| *expires > now);
        states.insert(state.clone(), (user.to_string(), now + self.ttl));
        state
    }

    /// Consume a state. Returns the user it was issued to, or `None` when it
    /// is unknown, already used or expired.
    pub fn take(&self, state: &str) -> Option<String> {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let (user, expires) = states.remove(state)?;
        (expires > Instant::now()).then_some(user)
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new(STATE_TTL)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub redirect_uri: String,
    pub state: String,
}

pub fn authorization_request(
    settings: &Settings,
    redirect_uri: &str,
    states: &OAuthStateStore,
    ctx: &RequestContext,
) -> Result<AuthorizationRequest> {
    if !settings.enabled {
        return Err(LeadAdsError::disabled());
    }
    let app_id = settings
        .app_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| LeadAdsError::Configuration("App ID is not configured".to_string()))?;

    let state = states.issue(&ctx.user);
    let url = reqwest::Url::parse_with_params(
        &settings.authorization_url,
        &[
            ("client_id", app_id),
            ("redirect_uri", redirect_uri),
            ("scope", settings.scope.as_str()),
            ("response_type", "code"),
            ("state", state.as_str()),
        ],
    )
    .map_err(|e| LeadAdsError::Configuration(format!("Invalid authorization URL: {e}")))?;

    Ok(AuthorizationRequest {
        authorization_url: url.to_string(),
        redirect_uri: redirect_uri.to_string(),
        state,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ReauthorizeRequest {
    pub message: String,
    pub authorization_url: String,
}

/// Tokens without a refresh grant are renewed by authorizing again.
pub fn refresh_request(
    settings: &Settings,
    redirect_uri: &str,
    states: &OAuthStateStore,
    ctx: &RequestContext,
) -> Result<ReauthorizeRequest> {
    let auth = authorization_request(settings, redirect_uri, states, ctx)?;
    Ok(ReauthorizeRequest {
        message: "Please re-authorize to get a new token".to_string(),
        authorization_url: auth.authorization_url,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The platform redirected back with an error.
    Denied {
        error: String,
        description: Option<String>,
    },
    /// Hit directly, without code and state.
    InvalidAccess,
    InvalidState,
    Authorized { token_expiry: Option<DateTime<Utc>> },
}

pub async fn handle_callback(
    db: &Database,
    graph: &dyn GraphApi,
    states: &OAuthStateStore,
    redirect_uri: &str,
    params: CallbackParams,
) -> Result<CallbackOutcome> {
    if let Some(error) = params.error {
        return Ok(CallbackOutcome::Denied {
            error,
            description: params.error_description,
        });
    }

    let (Some(code), Some(state)) = (params.code, params.state) else {
        return Ok(CallbackOutcome::InvalidAccess);
    };

    if states.take(&state).is_none() {
        return Ok(CallbackOutcome::InvalidState);
    }

    let current = db.get_settings().await?;
    let creds = settings::app_credentials(&current)?;

    let grant = graph
        .exchange_code(
            &creds.access_token_url,
            &creds.app_id,
            &creds.app_secret,
            redirect_uri,
            &code,
        )
        .await
        .map_err(|e| LeadAdsError::OAuth(format!("{e:#}")))?;

    tracing::info!(expires_in = ?grant.expires_in, "Facebook OAuth: received token");
    let updated = settings::set_access_token(db, &grant.access_token, grant.expires_in).await?;

    Ok(CallbackOutcome::Authorized {
        token_expiry: updated.token_expiry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_settings(db_settings: Settings) -> Settings {
        Settings {
            enabled: true,
            app_id: Some("app 1".to_string()),
            app_secret: Some("secret".to_string()),
            ..db_settings
        }
    }

    #[tokio::test]
    async fn authorization_url_carries_encoded_params() {
        let db = Database::in_memory().await.unwrap();
        let settings = enabled_settings(db.get_settings().await.unwrap());
        let states = OAuthStateStore::default();
        let ctx = RequestContext::guest("site").with_user("admin@example.com");

        let auth = authorization_request(
            &settings,
            "https://crm.example.com/api/oauth/callback",
            &states,
            &ctx,
        )
        .unwrap();

        let url = reqwest::Url::parse(&auth.authorization_url).unwrap();
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "app 1");
        assert_eq!(params["redirect_uri"], "https://crm.example.com/api/oauth/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["state"], auth.state);
        assert_eq!(states.take(&auth.state).as_deref(), Some("admin@example.com"));
    }

    #[tokio::test]
    async fn authorization_requires_enabled_and_app_id() {
        let db = Database::in_memory().await.unwrap();
        let states = OAuthStateStore::default();
        let ctx = RequestContext::guest("site");

        let settings = db.get_settings().await.unwrap();
        let err = authorization_request(&settings, "r", &states, &ctx).unwrap_err();
        assert_eq!(err.to_string(), "Facebook Lead Ads is not enabled");

        let settings = Settings {
            enabled: true,
            ..settings
        };
        let err = authorization_request(&settings, "r", &states, &ctx).unwrap_err();
        assert_eq!(err.to_string(), "App ID is not configured");
    }

    #[test]
    fn state_is_single_use_and_expires() {
        let states = OAuthStateStore::new(Duration::from_secs(600));
        let state = states.issue("u");
        assert_eq!(states.take(&state).as_deref(), Some("u"));
        assert!(states.take(&state).is_none());

        let expired = OAuthStateStore::new(Duration::ZERO);
        let state = expired.issue("u");
        assert!(expired.take(&state).is_none());
        assert!(expired.take("never-issued").is_none());
    }
}
