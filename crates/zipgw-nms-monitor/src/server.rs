// crates/zipgw-nms-monitor/src/server.rs
//! Implements the web server and WebSocket logic using axum.

use crate::model::NmsSnapshot;
use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{Html, IntoResponse},
    routing::get,
};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Shared application state: the fan-out channel to WebSocket clients and
/// the most recent snapshot for plain HTTP polling.
#[derive(Clone)]
pub(super) struct AppState {
    pub(super) snapshot_tx: broadcast::Sender<NmsSnapshot>,
    pub(super) latest: Arc<RwLock<Option<NmsSnapshot>>>,
}

impl AppState {
    pub(super) fn new(capacity: usize) -> Self {
        let (snapshot_tx, _) = broadcast::channel(capacity);
        Self {
            snapshot_tx,
            latest: Arc::new(RwLock::new(None)),
        }
    }

    fn latest(&self) -> Option<NmsSnapshot> {
        self.latest.read().ok().and_then(|latest| latest.clone())
    }

    /// Stores `snapshot` as the latest one and hands it to every connected
    /// client.
    pub(super) fn publish(&self, snapshot: NmsSnapshot) {
        match self.latest.write() {
            Ok(mut latest) => *latest = Some(snapshot.clone()),
            Err(_) => error!("[Monitor] Latest snapshot lock poisoned"),
        }
        // No subscriber is fine, the snapshot is still kept for /snapshot.
        let _ = self.snapshot_tx.send(snapshot);
    }
}

/// Moves snapshots from the gateway thread into the async world. Runs on a
/// blocking task until the sending side is dropped.
#[cfg(feature = "in-process")]
pub(super) fn forward_snapshots(
    receiver: crossbeam_channel::Receiver<NmsSnapshot>,
    state: AppState,
) {
    while let Ok(snapshot) = receiver.recv() {
        log::trace!("[Monitor] Snapshot in state {}", snapshot.state);
        state.publish(snapshot);
    }
    info!("[Monitor] Snapshot channel closed");
}

/// Binds to `addr` and serves the monitor until the server fails.
pub(super) async fn start_web_server(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/ws", get(websocket_handler))
        .route("/snapshot", get(snapshot_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("[Monitor] Failed to bind web server to {}: {}", addr, e);
        e
    })?;
    info!("[Monitor] Web monitor listening on http://{}", addr);

    axum::serve(listener, app).await.map_err(|e| {
        error!("[Monitor] Web server encountered an error: {}", e);
        e
    })
}

async fn root_handler() -> impl IntoResponse {
    Html(include_str!("web/monitor.html"))
}

/// The latest snapshot, or `null` before the first one arrived.
async fn snapshot_handler(State(state): State<AppState>) -> Json<Option<NmsSnapshot>> {
    Json(state.latest())
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_snapshot(socket: &mut WebSocket, snapshot: &NmsSnapshot) -> bool {
    match serde_json::to_string(snapshot) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!("[Monitor] Failed to serialize snapshot: {}", e);
            true
        }
    }
}

/// Streams every snapshot to one WebSocket client, starting with the latest.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("[Monitor] WebSocket client connected");
    let mut snapshot_rx = state.snapshot_tx.subscribe();

    if let Some(snapshot) = state.latest() {
        if !send_snapshot(&mut socket, &snapshot).await {
            return;
        }
    }

    loop {
        tokio::select! {
            result = snapshot_rx.recv() => match result {
                Ok(snapshot) => {
                    if !send_snapshot(&mut socket, &snapshot).await {
                        info!("[Monitor] WebSocket client disconnected (send error)");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("[Monitor] WebSocket client lagging, skipped {} snapshots", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("[Monitor] Snapshot broadcast closed");
                    break;
                }
            },
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | None => {
                    info!("[Monitor] WebSocket client disconnected");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("[Monitor] WebSocket receive error: {}", e);
                    break;
                }
            },
        }
    }
}
