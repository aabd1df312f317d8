use crate::AppState;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use leadhook_core::context::RequestContext;
use std::convert::Infallible;
use std::net::SocketAddr;

/// Header an authenticating proxy sets to the signed-in user.
pub const FORWARDED_USER: &str = "x-forwarded-user";
const FORWARDED_FOR: &str = "x-forwarded-for";

/// Extracts the [`RequestContext`] for the configured site. Requests that
/// reach us without a proxy-asserted user are handled as guests.
#[derive(Debug, Clone)]
pub struct Ctx(pub RequestContext);

impl FromRequestParts<AppState> for Ctx {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let mut ctx = RequestContext::guest(state.config.instance.site.clone());

        if let Some(user) = header(parts, FORWARDED_USER) {
            ctx = ctx.with_user(user);
        }

        // First hop of X-Forwarded-For wins over the socket peer.
        let forwarded = header(parts, FORWARDED_FOR)
            .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        if let Some(addr) = forwarded.or(peer) {
            ctx = ctx.with_remote_addr(addr);
        }

        Ok(Ctx(ctx))
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
