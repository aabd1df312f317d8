//! Outbound calls to the platform's Graph-style API.

mod client;

pub use client::GraphClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// App credentials needed for app-level calls (webhook subscriptions).
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_secret: String,
    pub access_token_url: String,
}

/// Body of an app webhook subscription request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAppSubscription {
    pub object: String,
    pub callback_url: String,
    pub verify_token: String,
    pub fields: Vec<String>,
    pub include_values: bool,
}

impl NewAppSubscription {
    pub fn leadgen(callback_url: &str, verify_token: &str) -> Self {
        Self {
            object: "page".to_string(),
            callback_url: callback_url.to_string(),
            verify_token: verify_token.to_string(),
            fields: vec!["leadgen".to_string()],
            include_values: true,
        }
    }
}

/// Result of exchanging an OAuth authorization code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds; `None` for long-lived tokens.
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

/// One batch of a cursor-paged listing such as `/me/accounts`.
#[derive(Debug, Clone, Default)]
pub struct PageBatch {
    pub data: Vec<serde_json::Value>,
    pub after: Option<String>,
}

#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Register the app's webhook for `sub.object`. Returns the platform's
    /// subscription id when it reports one.
    async fn create_app_subscription(
        &self,
        creds: &AppCredentials,
        sub: &NewAppSubscription,
    ) -> Result<Option<String>>;

    /// Install the app on a page so its events reach the app webhook.
    async fn install_app_on_page(
        &self,
        user_token: &str,
        page_id: &str,
        subscribed_fields: &str,
    ) -> Result<()>;

    async fn delete_app_subscription(&self, creds: &AppCredentials, object: &str) -> Result<()>;

    async fn exchange_code(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        code: &str,
    ) -> Result<TokenGrant>;

    async fn list_pages(&self, user_token: &str, after: Option<&str>) -> Result<PageBatch>;

    /// Lead forms of a page, read with the page's own token.
    async fn list_forms(
        &self,
        user_token: &str,
        page_id: &str,
        after: Option<&str>,
    ) -> Result<PageBatch>;

    /// Field data and ad attribution of a single lead.
    async fn get_lead(&self, user_token: &str, leadgen_id: &str) -> Result<serde_json::Value>;

    async fn get_form(&self, user_token: &str, form_id: &str) -> Result<serde_json::Value>;
}
