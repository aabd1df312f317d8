use crate::db::Database;
use crate::error::{LeadAdsError, Result};
use crate::generate_token;
use crate::graph::AppCredentials;
use crate::models::{Settings, TokenStatus, UpdateSettings};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const VERIFY_TOKEN_LEN: usize = 32;

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Enabling the integration requires app credentials.
pub fn validate(settings: &Settings) -> Result<()> {
    if settings.enabled {
        if !present(&settings.app_id) {
            return Err(LeadAdsError::Validation(
                "App ID is required when Facebook Lead Ads is enabled".to_string(),
            ));
        }
        if !present(&settings.app_secret) {
            return Err(LeadAdsError::Validation(
                "App Secret is required when Facebook Lead Ads is enabled".to_string(),
            ));
        }
    }
    Ok(())
}

/// Derive webhook credentials for an enabled integration. An existing
/// verify token is kept.
pub fn before_save(settings: &mut Settings, webhook_url: &str) {
    if settings.enabled {
        settings.webhook_callback_url = Some(webhook_url.to_string());
        if !present(&settings.verify_token) {
            settings.verify_token = Some(generate_token(VERIFY_TOKEN_LEN));
        }
    }
}

pub async fn update_settings(
    db: &Database,
    input: UpdateSettings,
    webhook_url: &str,
) -> Result<Settings> {
    let mut settings = db.get_settings().await?;

    if let Some(enabled) = input.enabled {
        settings.enabled = enabled;
    }
    if let Some(app_id) = input.app_id {
        settings.app_id = Some(app_id);
    }
    if let Some(app_secret) = input.app_secret {
        settings.app_secret = Some(app_secret);
    }
    if let Some(url) = input.authorization_url {
        settings.authorization_url = url;
    }
    if let Some(url) = input.access_token_url {
        settings.access_token_url = url;
    }
    if let Some(scope) = input.scope {
        settings.scope = scope;
    }

    validate(&settings)?;
    before_save(&mut settings, webhook_url);
    db.save_settings(&settings).await?;

    tracing::info!(enabled = settings.enabled, "Lead ads settings updated");
    Ok(settings)
}

#[derive(Debug, Clone, Serialize)]
pub struct RegeneratedToken {
    pub message: String,
    pub verify_token: String,
}

/// Replace the verify token. The webhook must be re-verified afterwards.
pub async fn regenerate_verify_token(db: &Database) -> Result<RegeneratedToken> {
    let mut settings = db.get_settings().await?;
    let token = generate_token(VERIFY_TOKEN_LEN);
    settings.verify_token = Some(token.clone());
    settings.webhook_is_active = false;
    db.save_settings(&settings).await?;

    Ok(RegeneratedToken {
        message: "Verify token regenerated. Please update it in Facebook.".to_string(),
        verify_token: token,
    })
}

/// Store a freshly granted access token. Skips validation.
pub async fn set_access_token(
    db: &Database,
    token: &str,
    expires_in: Option<i64>,
) -> Result<Settings> {
    let mut settings = db.get_settings().await?;
    settings.access_token = Some(token.to_string());
    settings.token_expiry = expires_in
        .filter(|secs| *secs > 0)
        .map(|secs| Utc::now() + Duration::seconds(secs));
    db.save_settings(&settings).await?;
    Ok(settings)
}

pub fn token_status(settings: &Settings, now: DateTime<Utc>) -> Result<TokenStatus> {
    if !settings.enabled {
        return Err(LeadAdsError::disabled());
    }

    let mut status = TokenStatus {
        has_token: present(&settings.access_token),
        token_expiry: None,
        is_expired: None,
        expires_in_seconds: None,
        expires_in_days: None,
        is_long_lived: None,
        message: None,
    };

    if !status.has_token {
        status.message = Some("No access token configured".to_string());
        return Ok(status);
    }

    status.token_expiry = settings.token_expiry;
    match settings.token_expiry {
        Some(expiry) if now > expiry => {
            status.is_expired = Some(true);
            status.message = Some("Token has expired. Please re-authorize.".to_string());
        }
        Some(expiry) => {
            let remaining = expiry - now;
            status.is_expired = Some(false);
            status.expires_in_seconds = Some(remaining.num_seconds());
            status.expires_in_days = Some(remaining.num_days());
        }
        None => {
            status.is_expired = Some(false);
            status.is_long_lived = Some(true);
            status.message = Some("Token is active (long-lived, no expiry)".to_string());
        }
    }

    Ok(status)
}

pub fn app_credentials(settings: &Settings) -> Result<AppCredentials> {
    match (&settings.app_id, &settings.app_secret) {
        (Some(app_id), Some(app_secret)) if !app_id.is_empty() && !app_secret.is_empty() => {
            Ok(AppCredentials {
                app_id: app_id.clone(),
                app_secret: app_secret.clone(),
                access_token_url: settings.access_token_url.clone(),
            })
        }
        _ => Err(LeadAdsError::Configuration(
            "App ID and App Secret must be configured".to_string(),
        )),
    }
}

pub fn access_token(settings: &Settings) -> Result<String> {
    settings
        .access_token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            LeadAdsError::Configuration("Please configure Facebook access token".to_string())
        })
}
