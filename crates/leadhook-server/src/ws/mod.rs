use crate::{AppState, Ctx};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use leadhook_core::models::RealtimeEvent;
use tokio::sync::broadcast::error::RecvError;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> Response {
    ws.on_upgrade(move |socket| stream_lead_events(socket, state, ctx.user))
}

/// Frame to push to `user` for `event`, if it belongs to them.
fn frame_for(event: &RealtimeEvent, user: &str) -> Option<String> {
    if event.user() != user {
        return None;
    }
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode realtime event");
            None
        }
    }
}

/// Pushes the connected user's lead notifications as JSON text frames until
/// either side closes.
async fn stream_lead_events(mut socket: WebSocket, state: AppState, user: String) {
    let mut rx = state.events.subscribe();
    tracing::info!(%user, "Realtime client connected");

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let Some(frame) = frame_for(&event, &user) else {
                        continue;
                    };
                    if socket.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(%user, "Realtime client missed {n} lead events");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(%user, "Realtime client disconnected");
}
