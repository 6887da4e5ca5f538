//! Foreground clients connected to the worker.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use super::messages::Message;

pub type ClientId = u64;

#[derive(Debug)]
struct ClientSlot {
    sender: mpsc::UnboundedSender<Message>,
    /// Version of the worker controlling this client, once claimed.
    controller: Option<String>,
}

/// Registry of open client contexts and their message channels.
#[derive(Debug, Default)]
pub struct ClientHub {
    next_id: AtomicU64,
    clients: Mutex<BTreeMap<ClientId, ClientSlot>>,
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. Broadcasts arrive on the returned receiver.
    pub async fn connect(&self) -> (ClientId, mpsc::UnboundedReceiver<Message>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = mpsc::unbounded_channel();
        self.clients.lock().await.insert(id, ClientSlot { sender, controller: None });
        tracing::debug!(client = id, "client connected");
        (id, receiver)
    }

    pub async fn disconnect(&self, id: ClientId) -> bool {
        self.clients.lock().await.remove(&id).is_some()
    }

    /// Take control of every open client. Returns how many were claimed.
    pub async fn claim(&self, version: &str) -> usize {
        let mut clients = self.clients.lock().await;
        for slot in clients.values_mut() {
            slot.controller = Some(version.to_string());
        }
        clients.len()
    }

    /// Send `message` to every client, dropping those whose receiver is gone.
    pub async fn broadcast(&self, message: &Message) -> usize {
        let mut clients = self.clients.lock().await;
        clients.retain(|id, slot| {
            let delivered = slot.sender.send(message.clone()).is_ok();
            if !delivered {
                tracing::debug!(client = id, "dropping closed client");
            }
            delivered
        });
        clients.len()
    }

    pub async fn controller(&self, id: ClientId) -> Option<String> {
        self.clients.lock().await.get(&id).and_then(|slot| slot.controller.clone())
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}
