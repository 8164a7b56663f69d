//! Best-effort fan-out of shell events to every other client.
//!
//! DESIGN
//! ======
//! [`Relay`] is the only way the core talks to other clients. Events arrive
//! in per-sender FIFO order without acknowledgement and never echo back to
//! the sender. A connected peer with room in its queue gets every event; a
//! peer whose queue is full misses that one (see below). Receivers treat a
//! repeated event as a no-op, so a transport that redelivers is also fine.
//! The CLI implements it over the relay server's websocket;
//! [`LocalHub`] implements it in-process for tests and single-process demos.
//!
//! Each peer owns a bounded `mpsc` channel. Broadcasting uses `try_send`, so
//! a full or closed channel drops that peer's copy instead of stalling the
//! sender.

#[cfg(test)]
#[path = "relay_test.rs"]
mod relay_test;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use frames::ShellEvent;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ShellError;

#[async_trait]
pub trait Relay: Send + Sync {
    /// Deliver `event` to every connected client except this one.
    async fn broadcast(&self, event: ShellEvent) -> Result<(), ShellError>;
}

type Peers = Arc<RwLock<HashMap<Uuid, mpsc::Sender<ShellEvent>>>>;

/// In-process relay hub.
#[derive(Clone)]
pub struct LocalHub {
    peers: Peers,
    capacity: usize,
}

impl LocalHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { peers: Arc::default(), capacity: capacity.max(1) }
    }

    /// Connect a new client. Returns its relay handle and inbound event stream.
    pub async fn join(&self) -> (HubRelay, mpsc::Receiver<ShellEvent>) {
        let client_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut peers = self.peers.write().await;
        peers.insert(client_id, tx);
        info!(%client_id, peers = peers.len(), "hub: client joined");
        (HubRelay { client_id, peers: self.peers.clone() }, rx)
    }

    pub async fn leave(&self, client_id: Uuid) {
        let mut peers = self.peers.write().await;
        if peers.remove(&client_id).is_some() {
            info!(%client_id, remaining = peers.len(), "hub: client left");
        }
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }
}

/// One client's handle on a [`LocalHub`].
#[derive(Clone)]
pub struct HubRelay {
    client_id: Uuid,
    peers: Peers,
}

impl HubRelay {
    #[must_use]
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }
}

#[async_trait]
impl Relay for HubRelay {
    async fn broadcast(&self, event: ShellEvent) -> Result<(), ShellError> {
        let peers = self.peers.read().await;
        if !peers.contains_key(&self.client_id) {
            return Err(ShellError::Relay("client is not connected to the hub".into()));
        }
        debug!(client_id = %self.client_id, kind = event.kind(), "hub: broadcast");
        for (peer_id, tx) in peers.iter() {
            if *peer_id == self.client_id {
                continue;
            }
            if let Err(e) = tx.try_send(event.clone()) {
                warn!(%peer_id, error = %e, "hub: dropped event for peer");
            }
        }
        Ok(())
    }
}
