//! Control surface for the developer dashboard.
//!
//! | route               | effect                                   |
//! |---------------------|------------------------------------------|
//! | `GET /app-info`     | application name and tool version        |
//! | `GET /instances`    | registered peers                         |
//! | `POST /instances`   | add and start one more peer              |
//! | `POST /clear`       | full reset, every peer is told to clear  |
//! | `GET /messages`     | audit trail since the last reset         |
//! | `GET /messages/ws`  | audit entries streamed as they happen    |

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use futures_util::{SinkExt, StreamExt};
use peersim_core::AuditEntry;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::{driver::SharedDriver, endpoint::InstanceInfo, orchestrator::Orchestrator};

/// Application metadata shown by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    /// Application name
    pub name: String,
    /// Version of this tool
    pub tool_version: String,
}

/// Reply to `POST /instances`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedInstance {
    /// Peer id
    pub id: String,
    /// Port the peer listens on
    pub port: u16,
}

/// State shared by control surface handlers.
#[derive(Clone)]
pub struct ControlState {
    orchestrator: Arc<Mutex<Orchestrator>>,
    driver: SharedDriver,
    app_info: Arc<AppInfo>,
}

impl ControlState {
    /// Bundle the orchestrator and its driver for the router.
    pub fn new(orchestrator: Arc<Mutex<Orchestrator>>, driver: SharedDriver, app_name: &str) -> Self {
        let app_info = AppInfo {
            name: app_name.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        Self { orchestrator, driver, app_info: Arc::new(app_info) }
    }
}

/// Build the control surface router.
pub fn router(state: ControlState) -> Router {
    Router::new()
        .route("/app-info", get(app_info))
        .route("/instances", get(list_instances).post(add_instance))
        .route("/clear", post(clear))
        .route("/messages", get(list_messages))
        .route("/messages/ws", get(messages_socket))
        .with_state(state)
}

async fn app_info(State(state): State<ControlState>) -> Json<AppInfo> {
    Json(AppInfo::clone(&state.app_info))
}

async fn list_instances(State(state): State<ControlState>) -> Json<Vec<InstanceInfo>> {
    Json(state.orchestrator.lock().await.instances())
}

async fn add_instance(
    State(state): State<ControlState>,
) -> Result<Json<AddedInstance>, (StatusCode, String)> {
    let mut orchestrator = state.orchestrator.lock().await;

    let instance = orchestrator
        .add()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    orchestrator.start().await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(AddedInstance { id: instance.id().to_string(), port: instance.port() }))
}

async fn clear(State(state): State<ControlState>) -> Json<Value> {
    info!("reset requested");
    state.orchestrator.lock().await.clear().await;
    Json(json!({}))
}

async fn list_messages(State(state): State<ControlState>) -> Json<Vec<AuditEntry>> {
    Json(state.driver.lock().await.broker().audit().to_vec())
}

async fn messages_socket(
    ws: WebSocketUpgrade,
    State(state): State<ControlState>,
) -> impl IntoResponse {
    let audit = state.driver.lock().await.subscribe_audit();
    ws.on_upgrade(move |socket| stream_audit(socket, audit))
}

async fn stream_audit(socket: WebSocket, mut audit: broadcast::Receiver<AuditEntry>) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    debug!("dashboard attached");

    loop {
        tokio::select! {
            entry = audit.recv() => match entry {
                Ok(entry) => {
                    let Ok(text) = serde_json::to_string(&entry) else {
                        continue;
                    };
                    if socket_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "dashboard fell behind audit stream");
                },
                Err(broadcast::error::RecvError::Closed) => break,
            },
            inbound = socket_receiver.next() => match inbound {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {},
            },
        }
    }

    debug!("dashboard detached");
}
