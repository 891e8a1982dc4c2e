use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use chatty_types::events::GatewayEvent;

/// Identifies one realtime connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a targeted push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the connection's outbound queue. Not an acknowledgement.
    Pushed(ConnectionId),
    /// No live connection; the recipient sees the message on its next fetch.
    Offline,
}

/// Maps user ids to their live connection and fans events out to them.
///
/// Owned by the server and cloned into handlers. One connection per user: a
/// later registration replaces the earlier one.
#[derive(Clone)]
pub struct PresenceRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Events every connected client receives (online user list).
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// user_id -> (conn_id, targeted sender)
    connections: RwLock<HashMap<String, (ConnectionId, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceRegistry {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(RegistryInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to events sent to every client.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Bind `user_id` to `conn_id`, replacing any earlier binding, and return
    /// the receiver for events targeted at this connection.
    pub async fn register(
        &self,
        user_id: &str,
        conn_id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<GatewayEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let replaced = self
            .inner
            .connections
            .write()
            .await
            .insert(user_id.to_string(), (conn_id.clone(), tx));

        if let Some((old, _)) = replaced {
            debug!(user_id, old = %old, new = %conn_id, "Connection replaced");
        }

        self.broadcast_online_users().await;
        rx
    }

    /// Remove whatever connection `user_id` has.
    pub async fn unregister(&self, user_id: &str) -> Option<ConnectionId> {
        let removed = self.inner.connections.write().await.remove(user_id);
        if removed.is_some() {
            self.broadcast_online_users().await;
        }
        removed.map(|(conn_id, _)| conn_id)
    }

    /// Remove `user_id` only if `conn_id` still owns it. A closing stale
    /// connection must not erase its replacement.
    pub async fn release(&self, user_id: &str, conn_id: &ConnectionId) -> bool {
        let removed = {
            let mut connections = self.inner.connections.write().await;
            match connections.get(user_id) {
                Some((current, _)) if current == conn_id => connections.remove(user_id).is_some(),
                _ => false,
            }
        };

        if removed {
            self.broadcast_online_users().await;
        }
        removed
    }

    pub async fn lookup(&self, user_id: &str) -> Option<ConnectionId> {
        self.inner
            .connections
            .read()
            .await
            .get(user_id)
            .map(|(conn_id, _)| conn_id.clone())
    }

    /// Sorted ids of every registered user.
    pub async fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.inner.connections.read().await.keys().cloned().collect();
        users.sort();
        users
    }

    /// Best-effort push to the user's live connection. No retry.
    pub async fn deliver(&self, user_id: &str, event: GatewayEvent) -> Delivery {
        let connections = self.inner.connections.read().await;
        let Some((conn_id, tx)) = connections.get(user_id) else {
            return Delivery::Offline;
        };

        match tx.send(event) {
            Ok(()) => Delivery::Pushed(conn_id.clone()),
            Err(_) => {
                debug!(user_id, conn = %conn_id, "Connection closed before push");
                Delivery::Offline
            }
        }
    }

    async fn broadcast_online_users(&self) {
        let users = self.online_users().await;
        // No subscribers is fine: nobody to tell.
        let _ = self.inner.broadcast_tx.send(GatewayEvent::GetOnlineUsers(users));
    }
}
