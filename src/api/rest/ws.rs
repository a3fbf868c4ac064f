use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::api::rest::extract::AppQuery;
use crate::models::actor::Actor;
use crate::models::event::{BookingEvent, BookingEventKind};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct EventFilter {
    /// Drivers watching the pending pool subscribe with `kind=created`.
    pub kind: Option<BookingEventKind>,
}

pub async fn ws_handler(
    actor: Actor,
    State(state): State<Arc<AppState>>,
    AppQuery(filter): AppQuery<EventFilter>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, actor, filter.kind))
}

/// Subscribers only receive events about bookings they could fetch directly.
fn forwards(actor: &Actor, kind: Option<BookingEventKind>, event: &BookingEvent) -> bool {
    kind.is_none_or(|wanted| wanted == event.kind) && actor.can_view(&event.booking)
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    actor: Actor,
    kind: Option<BookingEventKind>,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.dispatch.subscribe());

    info!(actor_id = %actor.id, role = %actor.role, filter = ?kind, "websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "websocket client lagging; events dropped");
                    continue;
                }
            };

            if !forwards(&actor, kind, &event) {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize booking event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}
