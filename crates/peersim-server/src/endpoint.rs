//! Peer endpoint: one WebSocket surface per simulated peer.
//!
//! Every socket connected to an endpoint shares the peer's broker handle.
//! Inbound requests are forwarded to the driver; everything the broker
//! relays to the peer is fanned out to all of its open sockets.

use std::{
    net::IpAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use axum::{
    Router,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use peersim_core::PeerId;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, warn};

use crate::{
    color::color_for_id,
    driver::SharedDriver,
    protocol::{self, ClientRequest, PeerInfo, ServerMessage},
};

/// Path clients connect to.
pub const SOCKET_PATH: &str = "/webxdc";

/// Capacity of the per-socket direct reply queue.
const REPLY_CAPACITY: usize = 32;

/// Close reason sent to a socket that lost relayed messages.
const LAGGED_REASON: &str = "fell behind broker relay";

/// Public description of an instance, as listed on the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    /// Peer id (the port as a string)
    pub id: String,
    /// Base URL of the peer
    pub url: String,
    /// Dashboard color
    pub color: String,
}

/// A simulated peer bound (or to be bound) to its own port.
#[derive(Debug, Clone)]
pub struct Instance {
    id: PeerId,
    port: u16,
    url: String,
    color: String,
}

impl Instance {
    /// Describe the instance for `port` on `host`.
    pub fn new(host: IpAddr, port: u16) -> Self {
        let id = PeerId::new(port.to_string());
        let color = color_for_id(id.as_str()).to_string();
        Self { id, port, url: format!("http://{host}:{port}"), color }
    }

    /// Broker id of this peer.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Port the endpoint listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Control surface listing entry.
    pub fn info(&self) -> InstanceInfo {
        InstanceInfo { id: self.id.to_string(), url: self.url.clone(), color: self.color.clone() }
    }

    /// Router serving this peer's socket.
    pub fn router(&self, driver: SharedDriver, app_name: &str) -> Router {
        let context = EndpointContext {
            peer_id: self.id.clone(),
            info: PeerInfo { name: app_name.to_string(), color: self.color.clone() },
            driver,
            sockets: AtomicUsize::new(0),
        };

        Router::new().route(SOCKET_PATH, get(socket_handler)).with_state(Arc::new(context))
    }
}

struct EndpointContext {
    peer_id: PeerId,
    info: PeerInfo,
    driver: SharedDriver,
    /// Open sockets; only touched while the driver lock is held
    sockets: AtomicUsize,
}

async fn socket_handler(
    ws: WebSocketUpgrade,
    State(context): State<Arc<EndpointContext>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, context))
}

async fn handle_socket(socket: WebSocket, context: Arc<EndpointContext>) {
    let relay = {
        let driver = context.driver.lock().await;
        let Some(relay) = driver.subscribe_relay(&context.peer_id) else {
            error!(peer = %context.peer_id, "endpoint has no relay");
            return;
        };
        context.sockets.fetch_add(1, Ordering::SeqCst);
        relay
    };

    debug!(peer = %context.peer_id, "socket connected");

    let (replies_sender, replies_receiver) = mpsc::channel(REPLY_CAPACITY);
    let (socket_sender, mut socket_receiver) = socket.split();

    let writer = tokio::spawn(forward_messages(
        context.peer_id.clone(),
        socket_sender,
        replies_receiver,
        relay,
    ));

    while let Some(message) = socket_receiver.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(peer = %context.peer_id, %e, "socket read failed");
                break;
            },
        };

        match message {
            Message::Text(text) => handle_text(&context, &text, &replies_sender).await,
            Message::Binary(_) => {
                warn!(peer = %context.peer_id, "dropping unexpected non-text data");
            },
            Message::Ping(_) | Message::Pong(_) => {},
            Message::Close(_) => break,
        }
    }

    writer.abort();

    let mut driver = context.driver.lock().await;
    if context.sockets.fetch_sub(1, Ordering::SeqCst) == 1 {
        if let Err(e) = driver.disconnect(&context.peer_id) {
            error!(peer = %context.peer_id, %e, "disconnect failed");
        }
    }
    debug!(peer = %context.peer_id, "socket disconnected");
}

async fn handle_text(
    context: &EndpointContext,
    text: &str,
    replies: &mpsc::Sender<ServerMessage>,
) {
    let request = match protocol::parse_request(text) {
        Ok(request) => request,
        Err(e) => {
            warn!(peer = %context.peer_id, %e, "dropping request");
            return;
        },
    };

    debug!(peer = %context.peer_id, ?request, "request received");

    let result = match request {
        ClientRequest::SendUpdate { update, descr } => {
            context.driver.lock().await.send_update(&context.peer_id, update, descr)
        },
        ClientRequest::SetUpdateListener { serial } => {
            context.driver.lock().await.connect(&context.peer_id, serial)
        },
        ClientRequest::RequestInfo => {
            let reply = ServerMessage::Info { info: context.info.clone() };
            if replies.send(reply).await.is_err() {
                debug!(peer = %context.peer_id, "socket closed before info reply");
            }
            Ok(())
        },
    };

    if let Err(e) = result {
        error!(peer = %context.peer_id, %e, "request failed");
    }
}

/// Write direct replies and relayed broker output to one socket.
///
/// A socket that falls behind its relay is closed with
/// [`close_code::AGAIN`].
async fn forward_messages(
    peer_id: PeerId,
    mut socket_sender: SplitSink<WebSocket, Message>,
    mut replies: mpsc::Receiver<ServerMessage>,
    mut relay: broadcast::Receiver<ServerMessage>,
) {
    loop {
        let message = tokio::select! {
            reply = replies.recv() => match reply {
                Some(message) => message,
                None => break,
            },
            relayed = relay.recv() => match relayed {
                Ok(message) => message,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Dropped events cannot be resent; the client reconnects
                    // with its serial and gets a replay instead
                    warn!(peer = %peer_id, skipped, "socket fell behind relay, closing");
                    let frame = CloseFrame { code: close_code::AGAIN, reason: LAGGED_REASON.into() };
                    if let Err(e) = socket_sender.send(Message::Close(Some(frame))).await {
                        debug!(peer = %peer_id, %e, "close after lag failed");
                    }
                    break;
                },
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                error!(peer = %peer_id, %e, "failed to serialize relay message");
                continue;
            },
        };

        if let Err(e) = socket_sender.send(Message::Text(text)).await {
            debug!(peer = %peer_id, %e, "socket send failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn instance_identity_derives_from_port() {
        let instance = Instance::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7001);

        assert_eq!(instance.id().as_str(), "7001");
        assert_eq!(instance.port(), 7001);
        assert_eq!(instance.info(), InstanceInfo {
            id: "7001".to_string(),
            url: "http://127.0.0.1:7001".to_string(),
            color: color_for_id("7001").to_string(),
        });
    }
}
