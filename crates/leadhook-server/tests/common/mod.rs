#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use leadhook_core::config::{GraphConfig, InstanceConfig, LeadhookConfig, LoggingConfig, WebhookConfig};
use leadhook_core::db::Database;
use leadhook_core::graph::{AppCredentials, GraphApi, NewAppSubscription, PageBatch, TokenGrant};
use leadhook_server::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

pub const VERIFY_TOKEN: &str = "site-verify-token";
pub const APP_SECRET: &str = "app-secret";

/// Records every platform call. Flip `fail` to make them all error.
#[derive(Default)]
pub struct FakeGraph {
    pub calls: Mutex<Vec<String>>,
    pub verify_tokens: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl FakeGraph {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == name).count()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn record(&self, name: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(name.to_string());
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("Facebook API Error: (#100) simulated failure");
        }
        Ok(())
    }
}

#[async_trait]
impl GraphApi for FakeGraph {
    async fn create_app_subscription(
        &self,
        _creds: &AppCredentials,
        sub: &NewAppSubscription,
    ) -> anyhow::Result<Option<String>> {
        self.record("create_app_subscription")?;
        self.verify_tokens.lock().unwrap().push(sub.verify_token.clone());
        Ok(Some("sub-1".to_string()))
    }

    async fn install_app_on_page(&self, _token: &str, _page_id: &str, _fields: &str) -> anyhow::Result<()> {
        self.record("install_app_on_page")
    }

    async fn delete_app_subscription(&self, _creds: &AppCredentials, _object: &str) -> anyhow::Result<()> {
        self.record("delete_app_subscription")
    }

    async fn exchange_code(
        &self,
        _token_url: &str,
        _client_id: &str,
        _client_secret: &str,
        _redirect_uri: &str,
        code: &str,
    ) -> anyhow::Result<TokenGrant> {
        self.record("exchange_code")?;
        Ok(TokenGrant {
            access_token: format!("token-for-{code}"),
            expires_in: Some(5_184_000),
            token_type: Some("bearer".to_string()),
        })
    }

    async fn list_pages(&self, _token: &str, _after: Option<&str>) -> anyhow::Result<PageBatch> {
        self.record("list_pages")?;
        Ok(PageBatch {
            data: vec![json!({ "id": "page-1", "name": "Main Page", "tasks": ["ADVERTISE"] })],
            after: None,
        })
    }

    async fn list_forms(&self, _token: &str, page_id: &str, _after: Option<&str>) -> anyhow::Result<PageBatch> {
        self.record("list_forms")?;
        Ok(PageBatch {
            data: vec![json!({ "id": format!("{page_id}-form"), "name": "Signup", "status": "ACTIVE" })],
            after: None,
        })
    }

    async fn get_lead(&self, _token: &str, leadgen_id: &str) -> anyhow::Result<Value> {
        self.record("get_lead")?;
        Ok(json!({
            "id": leadgen_id,
            "created_time": "2025-01-01T00:00:00+0000",
            "field_data": [
                { "name": "email", "values": ["ada@example.com"] },
                { "name": "full_name", "values": ["Ada Lovelace"] }
            ],
            "adset_id": "adset-1",
            "adset_name": "Spring"
        }))
    }

    async fn get_form(&self, _token: &str, form_id: &str) -> anyhow::Result<Value> {
        self.record("get_form")?;
        Ok(json!({ "id": form_id, "name": "Signup", "page": { "id": "page-1" } }))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub graph: Arc<FakeGraph>,
    _logs: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_signature(false).await
    }

    pub async fn with_signature(require_signature: bool) -> Self {
        let logs = tempfile::tempdir().unwrap();
        let config = LeadhookConfig {
            instance: InstanceConfig {
                name: "test".to_string(),
                site: "crm.test".to_string(),
                port: 0,
                db_path: ":memory:".to_string(),
                base_url: "https://crm.example.com".to_string(),
            },
            logging: LoggingConfig {
                dir: logs.path().to_path_buf(),
                ..Default::default()
            },
            graph: GraphConfig::default(),
            webhook: WebhookConfig { require_signature },
        };

        let db = Database::in_memory().await.unwrap();
        let graph = Arc::new(FakeGraph::default());
        let state = AppState::new(config, db, graph.clone());
        let router = build_router(state.clone());

        Self {
            router,
            state,
            graph,
            _logs: logs,
        }
    }

    /// Enable the integration with app credentials, a verify token and a
    /// user access token.
    pub async fn enable(&self) {
        let mut settings = self.state.db.get_settings().await.unwrap();
        settings.enabled = true;
        settings.app_id = Some("1234".to_string());
        settings.app_secret = Some(APP_SECRET.to_string());
        settings.verify_token = Some(VERIFY_TOKEN.to_string());
        settings.access_token = Some("user-token".to_string());
        self.state.db.save_settings(&settings).await.unwrap();
    }

    /// Status, content type and body text.
    pub async fn send_raw(&self, req: Request<Body>) -> (StatusCode, String, String) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, String) {
        let (status, _, body) = self.send_raw(req).await;
        (status, body)
    }

    pub async fn get_with_type(&self, uri: &str) -> (StatusCode, String, String) {
        self.send_raw(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.get(uri).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    pub async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body) = self.send(req).await;
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap()
        };
        (status, json)
    }

    pub async fn post_webhook(&self, body: impl Into<Body>) -> (StatusCode, Value) {
        let req = Request::post("/api/webhook")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        let (status, body) = self.send(req).await;
        (status, serde_json::from_str(&body).unwrap())
    }
}

pub fn leadgen_change(leadgen_id: &str, page_id: &str, form_id: &str) -> Value {
    json!({
        "field": "leadgen",
        "value": {
            "leadgen_id": leadgen_id,
            "page_id": page_id,
            "form_id": form_id,
            "ad_id": "ad-1",
            "adset_id": "adset-1",
            "created_time": 1_700_000_000
        }
    })
}

pub fn page_event(entries: Vec<Value>) -> Value {
    json!({ "object": "page", "entry": entries })
}

pub fn entry(id: &str, changes: Vec<Value>) -> Value {
    json!({ "id": id, "time": 1_700_000_000, "changes": changes })
}
