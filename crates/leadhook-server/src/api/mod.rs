mod accounts;
mod diagnostics;
mod health;
mod leads;
mod oauth;
mod settings;
mod subscriptions;
mod webhook;

use crate::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(webhook::router())
        .merge(diagnostics::router())
        .merge(settings::router())
        .merge(subscriptions::router())
        .merge(oauth::router())
        .merge(accounts::router())
        .merge(leads::router())
}
