use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MessageId, ProfileSummary, UserId};

/// A single direct message between two matched users.
///
/// The same struct is persisted by the store and pushed over the wire in
/// [`ServerEvent::NewMessage`], so it derives both serde traits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Users who have viewed this message.  Grows monotonically and is
    /// always a subset of {sender, receiver}.
    pub seen_by: Vec<UserId>,
}

impl Message {
    /// Build a fresh outgoing message.  New messages start with an empty
    /// seen-by set; the sender is *not* implicitly counted as a viewer.
    pub fn new(sender_id: UserId, receiver_id: UserId, content: String) -> Self {
        Self {
            id: MessageId::new(),
            sender_id,
            receiver_id,
            content,
            created_at: Utc::now(),
            seen_by: Vec::new(),
        }
    }
}

/// Events pushed to connected clients over the WebSocket.
///
/// Delivery is best-effort and at-most-once: events for offline users are
/// dropped, and clients reconcile through a pull-based fetch on reconnect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A mutual match formed.  Sent to both parties individually, each
    /// carrying the *other* side's public profile.
    NewMatch(ProfileSummary),

    /// A direct message arrived.  Sent to the receiver only.
    NewMessage { message: Message },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_starts_unseen() {
        let msg = Message::new(UserId::new(), UserId::new(), "hi".into());
        assert!(msg.seen_by.is_empty());
    }

    #[test]
    fn event_json_is_tagged() {
        let event = ServerEvent::NewMatch(ProfileSummary {
            id: UserId::new(),
            name: "Ada".into(),
            image: "https://example.com/ada.png".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "newMatch");
        assert_eq!(json["data"]["name"], "Ada");
    }
}
