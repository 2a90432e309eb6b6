use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Extension;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use jobcast_jobs::ObserverIdentity;
use tracing::{debug, info, warn};

use crate::handlers::utils::observer_identity;
use crate::state::AppState;

/// GET /jobs/ws
/// Upgrade to a WebSocket that streams `job_update` messages.
pub async fn job_updates(
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let identity = observer_identity(&headers);
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: ObserverIdentity) {
    let user = identity.user.clone();
    let (session_id, mut rx) = state.hub.register(identity);
    info!(session_id, user = ?user, "job observer connected");

    let (mut sink, mut stream) = socket.split();

    let forward_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(error) => {
                    warn!(%error, "failed to encode job update");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Clients only listen; anything they send is ignored until they close.
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Close(_) => break,
            Message::Text(_) | Message::Binary(_) => {
                debug!(session_id, "ignoring client message");
            }
            _ => {}
        }
    }

    state.hub.disconnect(session_id);
    forward_task.abort();
    info!(session_id, "job observer disconnected");
}
