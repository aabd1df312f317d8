use super::{AppCredentials, GraphApi, NewAppSubscription, PageBatch, TokenGrant};
use crate::config::GraphConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const PAGE_FIELDS: &str =
    "id,name,category,category_list,business,global_brand_page_name,location,tasks,access_token";
const FORM_LIST_FIELDS: &str = "id,name,status,locale";
const LEAD_FIELDS: &str = "field_data,created_time,ad_id,ad_name,adset_id,adset_name,form_id";
const FORM_FIELDS: &str = "id,name,locale,status,page,questions";

/// `reqwest` implementation of [`GraphApi`].
#[derive(Debug, Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
}

impl GraphClient {
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}{}", self.base_url, self.api_version, endpoint)
    }

    /// Client-credentials token for app-level endpoints.
    async fn app_access_token(&self, creds: &AppCredentials) -> Result<String> {
        let body = send(
            self.http.post(&creds.access_token_url).form(&[
                ("client_id", creds.app_id.as_str()),
                ("client_secret", creds.app_secret.as_str()),
                ("grant_type", "client_credentials"),
            ]),
        )
        .await
        .context("Failed to get app access token")?;

        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("No app access token in response")
    }

    async fn page_access_token(&self, user_token: &str, page_id: &str) -> Result<String> {
        let page = send(
            self.http
                .get(self.url(&format!("/{page_id}")))
                .bearer_auth(user_token)
                .query(&[("fields", "id,name,access_token")]),
        )
        .await?;

        page.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("Could not get page access token")
    }
}

#[async_trait]
impl GraphApi for GraphClient {
    async fn create_app_subscription(
        &self,
        creds: &AppCredentials,
        sub: &NewAppSubscription,
    ) -> Result<Option<String>> {
        let token = self.app_access_token(creds).await?;
        let fields = sub.fields.join(",");
        let include_values = sub.include_values.to_string();

        let body = send(
            self.http
                .post(self.url(&format!("/{}/subscriptions", creds.app_id)))
                .bearer_auth(&token)
                .query(&[
                    ("object", sub.object.as_str()),
                    ("callback_url", sub.callback_url.as_str()),
                    ("verify_token", sub.verify_token.as_str()),
                    ("fields", fields.as_str()),
                    ("include_values", include_values.as_str()),
                ]),
        )
        .await?;

        Ok(body.get("id").and_then(id_string))
    }

    async fn install_app_on_page(
        &self,
        user_token: &str,
        page_id: &str,
        subscribed_fields: &str,
    ) -> Result<()> {
        let page_token = self.page_access_token(user_token, page_id).await?;

        send(
            self.http
                .post(self.url(&format!("/{page_id}/subscribed_apps")))
                .query(&[
                    ("subscribed_fields", subscribed_fields),
                    ("access_token", page_token.as_str()),
                ]),
        )
        .await
        .context("Failed to install app on page")?;

        Ok(())
    }

    async fn delete_app_subscription(&self, creds: &AppCredentials, object: &str) -> Result<()> {
        let token = self.app_access_token(creds).await?;

        send(
            self.http
                .delete(self.url(&format!("/{}/subscriptions", creds.app_id)))
                .bearer_auth(&token)
                .query(&[("object", object)]),
        )
        .await?;

        Ok(())
    }

    async fn exchange_code(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        code: &str,
    ) -> Result<TokenGrant> {
        let resp = self
            .http
            .post(token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
            .send()
            .await?;

        let status = resp.status();
        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let text = resp.text().await?;

        if !status.is_success() {
            anyhow::bail!("Failed to exchange code for token: {text}");
        }

        let grant = if is_json {
            let body: Value = serde_json::from_str(&text)?;
            grant_from_pairs(|key| body.get(key).and_then(id_string))
        } else {
            // Older API versions answer with a form-encoded body.
            let form: FormGrant = serde_urlencoded::from_str(&text)
                .context("Malformed token response from Facebook")?;
            grant_from_pairs(|key| match key {
                "access_token" => form.access_token.clone(),
                "expires_in" => form.expires_in.clone().or_else(|| form.expires.clone()),
                "token_type" => form.token_type.clone(),
                _ => None,
            })
        };

        grant.context("No access token received from Facebook")
    }

    async fn list_pages(&self, user_token: &str, after: Option<&str>) -> Result<PageBatch> {
        let mut query = vec![("fields", PAGE_FIELDS)];
        if let Some(after) = after {
            query.push(("after", after));
        }

        let body = send(
            self.http
                .get(self.url("/me/accounts"))
                .bearer_auth(user_token)
                .query(&query),
        )
        .await?;

        Ok(batch_from(&body))
    }

    async fn list_forms(
        &self,
        user_token: &str,
        page_id: &str,
        after: Option<&str>,
    ) -> Result<PageBatch> {
        let page_token = self.page_access_token(user_token, page_id).await?;

        let mut query = vec![("fields", FORM_LIST_FIELDS), ("access_token", page_token.as_str())];
        if let Some(after) = after {
            query.push(("after", after));
        }

        let body = send(
            self.http
                .get(self.url(&format!("/{page_id}/leadgen_forms")))
                .query(&query),
        )
        .await
        .context("Failed to get form list")?;

        Ok(batch_from(&body))
    }

    async fn get_lead(&self, user_token: &str, leadgen_id: &str) -> Result<Value> {
        send(
            self.http
                .get(self.url(&format!("/{leadgen_id}")))
                .bearer_auth(user_token)
                .query(&[("fields", LEAD_FIELDS)]),
        )
        .await
    }

    async fn get_form(&self, user_token: &str, form_id: &str) -> Result<Value> {
        send(
            self.http
                .get(self.url(&format!("/{form_id}")))
                .bearer_auth(user_token)
                .query(&[("fields", FORM_FIELDS)]),
        )
        .await
    }
}

fn batch_from(body: &Value) -> PageBatch {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let after = body
        .pointer("/paging/cursors/after")
        .and_then(Value::as_str)
        .map(str::to_string);
    PageBatch { data, after }
}

async fn send(request: RequestBuilder) -> Result<Value> {
    let resp = request.send().await?;
    parse(resp).await
}

async fn parse(resp: Response) -> Result<Value> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("HTTP {status}"));
        tracing::error!(%status, %message, "Facebook API request failed");
        anyhow::bail!("Facebook API Error: {message}");
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Ids and counters arrive either as JSON strings or numbers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct FormGrant {
    access_token: Option<String>,
    expires: Option<String>,
    expires_in: Option<String>,
    token_type: Option<String>,
}

fn grant_from_pairs(get: impl Fn(&str) -> Option<String>) -> Option<TokenGrant> {
    let access_token = get("access_token").filter(|t| !t.is_empty())?;
    Some(TokenGrant {
        access_token,
        expires_in: get("expires_in").and_then(|s| s.parse().ok()),
        token_type: get("token_type").or_else(|| Some("Bearer".to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GraphClient {
        GraphClient::new(&GraphConfig {
            base_url: server.uri(),
            api_version: "v24.0".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn creds(server: &MockServer) -> AppCredentials {
        AppCredentials {
            app_id: "app1".to_string(),
            app_secret: "shh".to_string(),
            access_token_url: format!("{}/oauth/access_token", server.uri()),
        }
    }

    async fn mount_app_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "app-token",
                "token_type": "bearer"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn create_subscription_uses_app_token() {
        let server = MockServer::start().await;
        mount_app_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/v24.0/app1/subscriptions"))
            .and(header("authorization", "Bearer app-token"))
            .and(query_param("object", "page"))
            .and(query_param("fields", "leadgen"))
            .and(query_param("verify_token", "vt"))
            .and(query_param("include_values", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 998877 })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .create_app_subscription(
                &creds(&server),
                &NewAppSubscription::leadgen("https://crm.example.com/api/webhook", "vt"),
            )
            .await
            .unwrap();

        assert_eq!(id.as_deref(), Some("998877"));
    }

    #[tokio::test]
    async fn api_error_message_is_surfaced() {
        let server = MockServer::start().await;
        mount_app_token(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/v24.0/app1/subscriptions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Invalid OAuth access token.", "code": 190 }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .delete_app_subscription(&creds(&server), "page")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Facebook API Error: Invalid OAuth access token.");
    }

    #[tokio::test]
    async fn install_fetches_page_token_first() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v24.0/page1"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "page1",
                "access_token": "page-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v24.0/page1/subscribed_apps"))
            .and(query_param("access_token", "page-token"))
            .and(query_param("subscribed_fields", "leadgen"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .install_app_on_page("user-token", "page1", "leadgen")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn exchange_code_accepts_form_encoded_reply() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .and(body_string_contains("code=abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("access_token=tok123&expires=5183999"),
            )
            .mount(&server)
            .await;

        let grant = client(&server)
            .exchange_code(
                &format!("{}/oauth/access_token", server.uri()),
                "app1",
                "shh",
                "https://crm.example.com/api/oauth/callback",
                "abc",
            )
            .await
            .unwrap();

        assert_eq!(grant.access_token, "tok123");
        assert_eq!(grant.expires_in, Some(5183999));
        assert_eq!(grant.token_type.as_deref(), Some("Bearer"));
    }

    #[tokio::test]
    async fn form_encoded_token_is_percent_decoded() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("access_token=EAAB%2Fxy%3D%3D&expires=100&token_type=bearer"),
            )
            .mount(&server)
            .await;

        let grant = client(&server)
            .exchange_code(
                &format!("{}/oauth/access_token", server.uri()),
                "app1",
                "shh",
                "https://crm.example.com/api/oauth/callback",
                "abc",
            )
            .await
            .unwrap();

        assert_eq!(grant.access_token, "EAAB/xy==");
        assert_eq!(grant.expires_in, Some(100));
        assert_eq!(grant.token_type.as_deref(), Some("bearer"));
    }

    #[tokio::test]
    async fn list_forms_uses_page_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v24.0/page1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "page1",
                "access_token": "page-token"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v24.0/page1/leadgen_forms"))
            .and(query_param("access_token", "page-token"))
            .and(query_param("fields", "id,name,status,locale"))
            .and(query_param("after", "c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "f1", "name": "Signup", "status": "ACTIVE", "locale": "en_US" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let batch = client(&server)
            .list_forms("user-token", "page1", Some("c1"))
            .await
            .unwrap();
        assert_eq!(batch.data[0]["name"], "Signup");
        assert!(batch.after.is_none());
    }

    #[tokio::test]
    async fn get_lead_requests_attribution_fields() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v24.0/lead-1"))
            .and(header("authorization", "Bearer user-token"))
            .and(query_param(
                "fields",
                "field_data,created_time,ad_id,ad_name,adset_id,adset_name,form_id",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "lead-1",
                "form_id": "f1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let lead = client(&server).get_lead("user-token", "lead-1").await.unwrap();
        assert_eq!(lead["form_id"], "f1");
    }

    #[tokio::test]
    async fn list_pages_reads_cursor() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v24.0/me/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "p1", "name": "Page One" }],
                "paging": { "cursors": { "before": "b", "after": "next" } }
            })))
            .mount(&server)
            .await;

        let batch = client(&server).list_pages("user-token", None).await.unwrap();
        assert_eq!(batch.data.len(), 1);
        assert_eq!(batch.after.as_deref(), Some("next"));
    }
}
