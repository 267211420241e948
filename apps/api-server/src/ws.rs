//! Stock alert WebSocket push (spec §4.6.4), adapted from the teacher's
//! sync hub (`titan-sync::hub`): upgrade, subscribe to the tenant's
//! broadcast channel, forward every message as JSON text, and ping on an
//! interval so idle connections are reaped by intermediaries. There is no
//! client-to-server protocol here (unlike the hub's `Hello`/device
//! registration) — a stock-alert subscriber only ever receives.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub async fn stock_alerts_ws(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let ctx = state.tenant(&tenant_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, ctx)))
}

async fn handle_socket(socket: WebSocket, ctx: Arc<crate::state::TenantContext>) {
    let (mut sender, mut receiver) = socket.split();
    let mut alerts = ctx.alert_hub.subscribe();

    let mut forward_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                alert = alerts.recv() => {
                    match alert {
                        Ok(alert) => {
                            let payload = serde_json::to_string(&crate::dto::to_camel_value(&alert)).unwrap_or_default();
                            if sender.send(Message::Text(payload)).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "stock alert subscriber lagged, some alerts were dropped");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = tokio::time::sleep(PING_INTERVAL) => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Drain the receive side purely so a client disconnect (Close frame)
    // ends the task promptly; this stream carries no client-initiated
    // protocol.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => recv_task.abort(),
        _ = &mut recv_task => forward_task.abort(),
    }
    debug!("stock alert websocket closed");
}
