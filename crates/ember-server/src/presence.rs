//! In-memory presence registry.
//!
//! Maps each online user to a single live connection handle.  The design is
//! last-connect-wins: a new connection for the same user supersedes the old
//! mapping, so a user connected from two tabs only receives pushes on
//! whichever connected most recently.  This is a known limitation, not a
//! bug to fix here.
//!
//! The registry is process-local.  A multi-process deployment needs either
//! a centralized registry or an external broker for cross-process fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use ember_shared::{ServerEvent, UserId};

/// One live connection: a unique id plus the channel events are pushed on.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub conn_id: Uuid,
    pub tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            tx,
        }
    }
}

/// Shared handle to the online-user map.  Cheap to clone.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    inner: Arc<Mutex<HashMap<UserId, ConnectionHandle>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `user` online.  Replaces (and drops) any previous handle for
    /// the same user, which closes the superseded connection's event
    /// channel.
    pub async fn register(&self, user: UserId, handle: ConnectionHandle) {
        let mut map = self.inner.lock().await;
        if let Some(old) = map.insert(user, handle) {
            tracing::debug!(user = %user, old_conn = %old.conn_id, "connection superseded");
        } else {
            tracing::debug!(user = %user, "user online");
        }
    }

    /// Mark the connection identified by `conn_id` offline.
    ///
    /// A no-op when the stored mapping was already superseded by a newer
    /// connection for the same user: a stale disconnect must never remove a
    /// newer handle.
    pub async fn unregister(&self, user: UserId, conn_id: Uuid) {
        let mut map = self.inner.lock().await;
        match map.get(&user) {
            Some(current) if current.conn_id == conn_id => {
                map.remove(&user);
                tracing::debug!(user = %user, "user offline");
            }
            _ => {
                tracing::debug!(user = %user, conn = %conn_id, "stale disconnect ignored");
            }
        }
    }

    /// The live event sender for `user`, if they are online.
    pub async fn lookup(&self, user: UserId) -> Option<mpsc::UnboundedSender<ServerEvent>> {
        self.inner.lock().await.get(&user).map(|h| h.tx.clone())
    }

    /// Number of currently online users.
    pub async fn online_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    #[tokio::test]
    async fn register_then_lookup() {
        let registry = PresenceRegistry::new();
        let user = UserId::new();

        assert!(registry.lookup(user).await.is_none());

        let (h, _rx) = handle();
        registry.register(user, h).await;
        assert!(registry.lookup(user).await.is_some());
        assert_eq!(registry.online_count().await, 1);
    }

    #[tokio::test]
    async fn reconnect_supersedes() {
        let registry = PresenceRegistry::new();
        let user = UserId::new();

        let (h1, _rx1) = handle();
        let first_conn = h1.conn_id;
        registry.register(user, h1).await;

        let (h2, mut rx2) = handle();
        registry.register(user, h2).await;

        // The newer handle is the live one.
        let tx = registry.lookup(user).await.unwrap();
        tx.send(ServerEvent::NewMessage {
            message: ember_shared::Message::new(UserId::new(), user, "hi".into()),
        })
        .unwrap();
        assert!(rx2.recv().await.is_some());

        // The first connection's late disconnect must not evict the second.
        registry.unregister(user, first_conn).await;
        assert!(registry.lookup(user).await.is_some());
    }

    #[tokio::test]
    async fn unregister_removes_current_handle() {
        let registry = PresenceRegistry::new();
        let user = UserId::new();

        let (h, _rx) = handle();
        let conn = h.conn_id;
        registry.register(user, h).await;
        registry.unregister(user, conn).await;

        assert!(registry.lookup(user).await.is_none());
        assert_eq!(registry.online_count().await, 0);
    }
}
