//! Public WebSocket stream.
//!
//! Flow:
//! 1. Client connects to `/public/ws`; the server sends `welcome`.
//! 2. Periodic `stats_update` frames on the configured interval and an
//!    `agents_update` frame whenever the registry mutates.
//! 3. Request/response frames: `ping` → `pong`, `get_discovery` →
//!    `discovery_data`.
//!
//! A bounded outbound queue decouples the handler from the socket; when it
//! fills, the client is dropped rather than blocking a registry mutation.
//! Idle connections time out after `WEBSOCKET_TIMEOUT`.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use arcp_protocol::{AgentStatus, ListFilter, PublicAgentInfo, PublicWsFrame};

use crate::api::public::discovery_page;
use crate::state::AppState;

/// Outbound queue depth per connection.
const OUTBOUND_QUEUE: usize = 64;

pub async fn public_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let connection_id = uuid::Uuid::new_v4().to_string();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<PublicWsFrame>(OUTBOUND_QUEUE);

    // Writer task: forwards queued frames to the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let welcome = PublicWsFrame::Welcome {
        message: "connected to the ARCP public stream".into(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    };
    if outbound_tx.send(welcome).await.is_err() {
        writer.abort();
        return;
    }

    tracing::debug!(connection_id = %connection_id, "public ws connected");

    let idle_timeout = Duration::from_secs(state.config.registry.websocket_timeout_secs.max(1));
    let stats_interval = Duration::from_secs(state.config.registry.websocket_interval_secs.max(1));
    let mut stats_ticker = tokio::time::interval(stats_interval);
    let mut agent_events = state.registry.bus().subscribe_agents();

    loop {
        tokio::select! {
            // Inbound frames (with idle timeout).
            inbound = tokio::time::timeout(idle_timeout, ws_stream.next()) => {
                match inbound {
                    Err(_) => {
                        tracing::debug!(connection_id = %connection_id, "public ws idle timeout");
                        break;
                    }
                    Ok(None) | Ok(Some(Err(_))) => break,
                    Ok(Some(Ok(Message::Close(_)))) => break,
                    Ok(Some(Ok(Message::Text(text)))) => {
                        let Ok(frame) = serde_json::from_str::<PublicWsFrame>(&text) else {
                            tracing::debug!(connection_id = %connection_id, "ignoring unparseable frame");
                            continue;
                        };
                        let reply = match frame {
                            PublicWsFrame::Ping => Some(PublicWsFrame::Pong),
                            PublicWsFrame::GetDiscovery { page, page_size, agent_type } => {
                                Some(PublicWsFrame::DiscoveryData {
                                    data: discovery_page(&state, page, page_size, agent_type),
                                })
                            }
                            _ => None,
                        };
                        if let Some(reply) = reply {
                            if outbound_tx.try_send(reply).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Some(Ok(_))) => {}
                }
            }

            // Periodic stats push.
            _ = stats_ticker.tick() => {
                let frame = PublicWsFrame::StatsUpdate {
                    data: serde_json::to_value(state.registry.stats()).unwrap_or_default(),
                };
                if outbound_tx.try_send(frame).is_err() {
                    tracing::debug!(connection_id = %connection_id, "public ws backpressure, dropping client");
                    break;
                }
            }

            // Registry mutations fan out as agents_update.
            event = agent_events.recv() => {
                match event {
                    Ok(_) => {
                        let agents: Vec<PublicAgentInfo> = state
                            .registry
                            .list(&ListFilter {
                                status: Some(AgentStatus::Alive),
                                ..ListFilter::default()
                            })
                            .iter()
                            .map(|a| a.redacted())
                            .collect();
                        if outbound_tx.try_send(PublicWsFrame::AgentsUpdate { data: agents }).is_err() {
                            tracing::debug!(connection_id = %connection_id, "public ws backpressure, dropping client");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(connection_id = %connection_id, skipped, "public ws lagged on bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    writer.abort();
    tracing::debug!(connection_id = %connection_id, "public ws disconnected");
}
