//! WebSocket endpoint streaming live usage stats.
//!
//! The upgrade happens here, outside the hub. The sink half of the socket is
//! handed to the hub; this task keeps draining the stream half so it notices
//! when the client goes away, then unregisters.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use super::routes::AppState;
use crate::hub::{Listener, StatsHub};

pub async fn stats_ws(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_stats_socket(socket, hub))
}

/// Sink half of a stats client's socket.
struct WsListener {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl Listener for WsListener {
    async fn send(&mut self, text: String) -> anyhow::Result<()> {
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

async fn handle_stats_socket(socket: WebSocket, hub: StatsHub) {
    let id = Uuid::new_v4();
    let (sink, mut stream) = socket.split();

    if hub.register(id, Box::new(WsListener { sink })).is_err() {
        tracing::warn!(listener = %id, "Stats hub is not running, dropping connection");
        return;
    }
    tracing::info!(listener = %id, "Stats client connected");

    // Clients never send anything meaningful; read only to detect the close.
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    let _ = hub.unregister(id);
    tracing::info!(listener = %id, "Stats client disconnected");
}
