//! Best-effort event dispatch.
//!
//! Events are delivered at most once, to currently-online targets only.
//! There is no retry and no queueing: persistence is the source of truth,
//! and offline clients reconcile through a pull-based fetch on reconnect.
//! A failed dispatch is therefore never surfaced to the triggering caller.

use ember_shared::{ServerEvent, UserId};

use crate::presence::PresenceRegistry;

#[derive(Clone)]
pub struct Dispatcher {
    registry: PresenceRegistry,
}

impl Dispatcher {
    pub fn new(registry: PresenceRegistry) -> Self {
        Self { registry }
    }

    /// Push `event` to `target` if they are online.  Returns whether a live
    /// connection received it.
    pub async fn dispatch(&self, target: UserId, event: ServerEvent) -> bool {
        let Some(tx) = self.registry.lookup(target).await else {
            tracing::debug!(user = %target, "dispatch target offline, event dropped");
            return false;
        };

        match tx.send(event) {
            Ok(()) => true,
            Err(e) => {
                // The socket task went away between lookup and send.
                tracing::warn!(user = %target, error = %e, "dispatch failed, event dropped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::ConnectionHandle;
    use ember_shared::{Message, ProfileSummary};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn dispatch_to_offline_target_is_dropped() {
        let dispatcher = Dispatcher::new(PresenceRegistry::new());

        let delivered = dispatcher
            .dispatch(
                UserId::new(),
                ServerEvent::NewMatch(ProfileSummary {
                    id: UserId::new(),
                    name: "Ada".into(),
                    image: String::new(),
                }),
            )
            .await;
        assert!(!delivered);
    }

    #[tokio::test]
    async fn dispatch_to_online_target_delivers() {
        let registry = PresenceRegistry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let user = UserId::new();

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(user, ConnectionHandle::new(tx)).await;

        let message = Message::new(UserId::new(), user, "hi".into());
        let delivered = dispatcher
            .dispatch(
                user,
                ServerEvent::NewMessage {
                    message: message.clone(),
                },
            )
            .await;

        assert!(delivered);
        assert_eq!(rx.recv().await, Some(ServerEvent::NewMessage { message }));
    }

    #[tokio::test]
    async fn dispatch_after_receiver_dropped_is_not_delivered() {
        let registry = PresenceRegistry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let user = UserId::new();

        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(user, ConnectionHandle::new(tx)).await;
        drop(rx);

        let delivered = dispatcher
            .dispatch(
                user,
                ServerEvent::NewMessage {
                    message: Message::new(UserId::new(), user, "hi".into()),
                },
            )
            .await;
        assert!(!delivered);
    }
}
