use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::relay::{PeerId, PeerRegistry, PeerSink, TransportError};
use crate::types::ServerEvent;

/// Registry-facing adapter for one WebSocket connection. Sends are enqueued
/// on the connection's channel and drained by `handle_ws`, so a broadcast
/// never blocks on a slow or closing socket.
pub struct WsPeer {
    id: PeerId,
    tx: mpsc::UnboundedSender<String>,
}

impl PeerSink for WsPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn send(&self, frame: &str) -> Result<(), TransportError> {
        self.tx
            .send(frame.to_owned())
            .map_err(|_| TransportError::Closed)
    }
}

/// Per-connection protocol: register, greet with current occupancy, then
/// interleave broadcast delivery with the keepalive exchange until the
/// socket closes. Unregistration is unconditional on every exit path.
pub async fn handle_ws(mut socket: WebSocket, registry: Arc<PeerRegistry>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let peer_id = registry.issue_id();
    registry.register(Arc::new(WsPeer { id: peer_id, tx }));

    // Count includes the peer just registered, so a new client always sees >= 1.
    let hello = ServerEvent::hello(registry.count());
    let hello_frame = serde_json::to_string(&hello).unwrap_or_default();
    if socket.send(Message::Text(hello_frame)).await.is_err() {
        registry.unregister(peer_id);
        return;
    }
    debug!(peer_id, connected_peers = registry.count(), "ws open");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Text(text))) => {
                        if text == "ping" {
                            if socket.send(Message::Text("pong".to_string())).await.is_err() {
                                break;
                            }
                        }
                        // Anything else is ignored: the channel stays tolerant
                        // of heterogeneous clients.
                    }
                    Some(Ok(_)) => {}
                }
            }
            frame = rx.recv() => {
                match frame {
                    Some(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    registry.unregister(peer_id);
    debug!(peer_id, connected_peers = registry.count(), "ws closed");
}
