//! In-memory fan-out of inbound messages to connected live-update clients.
//!
//! The registry is per process: deploying multiple instances needs an
//! external pub/sub layer, which this service deliberately does not provide.
//! Delivery is best-effort fire-and-forget; there is no queue and no backlog,
//! so with zero peers an event is simply dropped and late joiners only see
//! events from their own hello onward.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{InboundMessage, ServerEvent};

pub type PeerId = u64;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer connection closed")]
    Closed,
}

/// The one capability a transport must provide before entering the registry.
///
/// `send` must be non-blocking: implementations enqueue the frame for their
/// connection's writer task rather than touching the socket.
pub trait PeerSink: Send + Sync {
    fn id(&self) -> PeerId;
    fn send(&self, frame: &str) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct PeerRegistry {
    peers: Mutex<HashMap<PeerId, Arc<dyn PeerSink>>>,
    next_id: AtomicU64,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue_id(&self) -> PeerId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Idempotent: re-registering a peer id leaves membership unchanged.
    pub fn register(&self, peer: Arc<dyn PeerSink>) {
        let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        peers.entry(peer.id()).or_insert(peer);
    }

    /// Idempotent: unregistering an absent peer is a no-op.
    pub fn unregister(&self, id: PeerId) {
        let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        peers.remove(&id);
    }

    pub fn count(&self) -> usize {
        self.peers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Pushes one `incoming` event to every registered peer.
    ///
    /// The envelope is serialized once and the same frame goes to every peer.
    /// A peer whose send fails is removed and the loop continues; nothing is
    /// surfaced to the caller beyond the delivered count.
    pub fn broadcast(&self, msg: &InboundMessage) -> usize {
        let frame = match serde_json::to_string(&ServerEvent::incoming(msg)) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("failed to serialize incoming event: {err}");
                return 0;
            }
        };

        let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, peer) in peers.iter() {
            match peer.send(&frame) {
                Ok(()) => delivered += 1,
                Err(_) => dead.push(*id),
            }
        }
        for id in dead {
            debug!(peer_id = id, "dropping unreachable peer");
            peers.remove(&id);
        }
        delivered
    }
}
