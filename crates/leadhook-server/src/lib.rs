mod api;
mod context;
mod error;
mod middleware;
mod ws;

pub use context::Ctx;
pub use error::{ApiError, ErrorPage};

use leadhook_core::config::LeadhookConfig;
use leadhook_core::db::Database;
use leadhook_core::graph::{GraphApi, GraphClient};
use leadhook_core::meta_log::{LoggerFactory, SiteLogger};
use leadhook_core::models::RealtimeEvent;
use leadhook_core::oauth::OAuthStateStore;
use leadhook_core::subscriptions::SubscriptionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LeadhookConfig>,
    pub db: Database,
    pub graph: Arc<dyn GraphApi>,
    pub subscriptions: SubscriptionManager,
    pub loggers: Arc<LoggerFactory>,
    pub oauth_states: Arc<OAuthStateStore>,
    pub events: broadcast::Sender<RealtimeEvent>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: LeadhookConfig, db: Database, graph: Arc<dyn GraphApi>) -> Self {
        let subscriptions = SubscriptionManager::new(db.clone(), graph.clone(), config.webhook_url());
        let loggers = LoggerFactory::new(&config.logging);
        let (events, _) = broadcast::channel::<RealtimeEvent>(256);

        Self {
            config: Arc::new(config),
            db,
            graph,
            subscriptions,
            loggers: Arc::new(loggers),
            oauth_states: Arc::new(OAuthStateStore::default()),
            events,
            started_at: Instant::now(),
        }
    }

    pub fn site_logger(&self, site: &str) -> Arc<SiteLogger> {
        self.loggers.for_site(site)
    }
}

pub fn build_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .merge(api::router())
        .merge(ws::router())
        .layer(middleware::cors_layer())
        .layer(middleware::trace_layer())
        .with_state(state)
}

pub async fn run_server(config: LeadhookConfig) -> anyhow::Result<()> {
    // Database setup
    let db_url = format!("sqlite:{}?mode=rwc", config.instance.db_path);
    let database = Database::connect(&db_url, 5).await?;

    let graph = GraphClient::new(&config.graph)?;
    let state = AppState::new(config.clone(), database, Arc::new(graph));

    tracing::info!(
        webhook_url = %config.webhook_url(),
        log_file = %state.loggers.log_path(&config.instance.site).display(),
        "Webhook endpoint ready"
    );

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.instance.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        "Leadhook server '{}' listening on {}",
        config.instance.name,
        addr
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
