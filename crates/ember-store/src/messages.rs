//! The per-pair message log and its seen-state reconciliation.
//!
//! A conversation is not a stored entity: it is the ordered sequence of all
//! messages between an unordered pair of users, reconstructed by query.
//! Ordering is by creation timestamp with rowid as the tie-break, so two
//! messages written in the same millisecond keep their insertion order.

use chrono::{DateTime, Utc};
use rusqlite::params;

use ember_shared::{MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Message, UnreadFlags};

impl Database {
    /// Persist a new message.  The seen-by set starts empty; the sender is
    /// not implicitly counted as a viewer.
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, sender_id, receiver_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                message.sender_id.to_string(),
                message.receiver_id.to_string(),
                message.content,
                message.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single message with its seen-by set.
    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        let mut message = self
            .conn()
            .query_row(
                "SELECT id, sender_id, receiver_id, content, created_at
                 FROM messages WHERE id = ?1",
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;
        message.seen_by = self.seen_by(message.id)?;
        Ok(message)
    }

    /// All messages between the unordered pair `{a, b}`, ascending by
    /// creation time, insertion order preserved for equal timestamps.
    pub fn conversation(&self, a: UserId, b: UserId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, sender_id, receiver_id, content, created_at
             FROM messages
             WHERE (sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1)
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![a.to_string(), b.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        for message in &mut messages {
            message.seen_by = self.seen_by(message.id)?;
        }
        Ok(messages)
    }

    /// Apply the viewer's "seen" action to both directions of the
    /// conversation with `counterpart`:
    ///
    /// 1. the viewer is added to the seen-by set of every message the
    ///    counterpart sent them, and
    /// 2. the viewer is added to the seen-by set of their *own* outgoing
    ///    messages to the counterpart.
    ///
    /// The second write is what lets [`Database::unread_flags`] answer
    /// "has the other side read my messages" cheaply.  Both writes are
    /// idempotent and commutative, so concurrent calls from the two parties
    /// need no ordering.
    pub fn mark_seen_both_directions(&self, viewer: UserId, counterpart: UserId) -> Result<()> {
        // Incoming: messages the counterpart sent to the viewer.
        self.conn().execute(
            "INSERT OR IGNORE INTO message_seen (message_id, user_id)
             SELECT id, ?1 FROM messages
             WHERE sender_id = ?2 AND receiver_id = ?1",
            params![viewer.to_string(), counterpart.to_string()],
        )?;

        // Outgoing: the viewer's own messages to the counterpart.
        self.conn().execute(
            "INSERT OR IGNORE INTO message_seen (message_id, user_id)
             SELECT id, ?1 FROM messages
             WHERE sender_id = ?1 AND receiver_id = ?2",
            params![viewer.to_string(), counterpart.to_string()],
        )?;

        Ok(())
    }

    /// Compute the viewer's unread badges for one match, from exact
    /// seen-by membership.
    pub fn unread_flags(&self, viewer: UserId, counterpart: UserId) -> Result<UnreadFlags> {
        let has_new_message: bool = self.conn().query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM messages m
                 WHERE m.sender_id = ?2 AND m.receiver_id = ?1
                   AND NOT EXISTS(
                       SELECT 1 FROM message_seen s
                       WHERE s.message_id = m.id AND s.user_id = ?1
                   )
             )",
            params![viewer.to_string(), counterpart.to_string()],
            |row| row.get(0),
        )?;

        let has_unseen_by_counterpart: bool = self.conn().query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM messages m
                 WHERE m.sender_id = ?1 AND m.receiver_id = ?2
                   AND NOT EXISTS(
                       SELECT 1 FROM message_seen s
                       WHERE s.message_id = m.id AND s.user_id = ?2
                   )
             )",
            params![viewer.to_string(), counterpart.to_string()],
            |row| row.get(0),
        )?;

        Ok(UnreadFlags {
            has_new_message,
            has_unseen_by_counterpart,
        })
    }

    fn seen_by(&self, message_id: MessageId) -> Result<Vec<UserId>> {
        let mut stmt = self.conn().prepare(
            "SELECT user_id FROM message_seen WHERE message_id = ?1 ORDER BY user_id ASC",
        )?;

        let rows = stmt.query_map(params![message_id.to_string()], |row| {
            let id_str: String = row.get(0)?;
            UserId::parse(&id_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        })?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Message`] with an empty seen-by set; the
/// caller fills it in afterwards.
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let sender_str: String = row.get(1)?;
    let receiver_str: String = row.get(2)?;
    let content: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let id = MessageId::parse(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let sender_id = UserId::parse(&sender_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let receiver_id = UserId::parse(&receiver_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id,
        sender_id,
        receiver_id,
        content,
        created_at,
        seen_by: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use ember_shared::{Gender, GenderPreference};

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_user(db: &Database, name: &str) -> UserId {
        let user = User::new(
            name,
            format!("https://img.test/{name}.png"),
            Gender::Male,
            GenderPreference::Both,
        );
        db.create_user(&user).unwrap();
        user.id
    }

    fn send(db: &Database, from: UserId, to: UserId, content: &str) -> Message {
        let msg = Message::new(from, to, content.into());
        db.insert_message(&msg).unwrap();
        msg
    }

    #[test]
    fn conversation_is_ordered_and_covers_both_directions() {
        let db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");
        let other = add_user(&db, "other");

        let m1 = send(&db, a, b, "hi");
        let m2 = send(&db, b, a, "hello");
        send(&db, a, other, "unrelated");

        let conv = db.conversation(a, b).unwrap();
        assert_eq!(conv.len(), 2);
        assert_eq!(conv[0].id, m1.id);
        assert_eq!(conv[1].id, m2.id);

        // Symmetric in the pair.
        assert_eq!(db.conversation(b, a).unwrap().len(), 2);
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        let now = Utc::now();
        let mut first = Message::new(a, b, "first".into());
        first.created_at = now;
        let mut second = Message::new(a, b, "second".into());
        second.created_at = now;

        db.insert_message(&first).unwrap();
        db.insert_message(&second).unwrap();

        let conv = db.conversation(a, b).unwrap();
        assert_eq!(conv[0].content, "first");
        assert_eq!(conv[1].content, "second");
    }

    #[test]
    fn new_messages_are_unseen() {
        let db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        let msg = send(&db, a, b, "hi");
        assert!(db.get_message(msg.id).unwrap().seen_by.is_empty());
    }

    #[test]
    fn mark_seen_updates_both_directions() {
        let db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        let incoming = send(&db, b, a, "from b");
        let outgoing = send(&db, a, b, "from a");

        db.mark_seen_both_directions(a, b).unwrap();

        // A is added to both the incoming and their own outgoing message.
        assert_eq!(db.get_message(incoming.id).unwrap().seen_by, vec![a]);
        assert_eq!(db.get_message(outgoing.id).unwrap().seen_by, vec![a]);
    }

    #[test]
    fn mark_seen_is_idempotent_and_monotonic() {
        let db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        let msg = send(&db, b, a, "hi");

        db.mark_seen_both_directions(a, b).unwrap();
        db.mark_seen_both_directions(a, b).unwrap();
        assert_eq!(db.get_message(msg.id).unwrap().seen_by, vec![a]);

        // The counterpart's own seen action only adds, never removes.
        db.mark_seen_both_directions(b, a).unwrap();
        let seen = db.get_message(msg.id).unwrap().seen_by;
        assert!(seen.contains(&a));
        assert!(seen.contains(&b));
    }

    #[test]
    fn unread_flags_reflect_seen_membership() {
        let db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        // M1: A -> B, unseen by B.  M2: B -> A, then seen by A.
        send(&db, a, b, "m1");
        send(&db, b, a, "m2");
        db.mark_seen_both_directions(a, b).unwrap();

        // B's perspective: A's message is new; B's own m2 has been read.
        let b_flags = db.unread_flags(b, a).unwrap();
        assert!(b_flags.has_new_message);
        assert!(!b_flags.has_unseen_by_counterpart);

        // A's perspective: nothing new (m2 was seen), but m1 is still
        // unread by B.
        let a_flags = db.unread_flags(a, b).unwrap();
        assert!(!a_flags.has_new_message);
        assert!(a_flags.has_unseen_by_counterpart);

        // Once B also marks seen, A's outgoing badge clears.
        db.mark_seen_both_directions(b, a).unwrap();
        let a_flags = db.unread_flags(a, b).unwrap();
        assert!(!a_flags.has_unseen_by_counterpart);
    }

    #[test]
    fn empty_conversation_has_no_flags() {
        let db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        let flags = db.unread_flags(a, b).unwrap();
        assert!(!flags.has_new_message);
        assert!(!flags.has_unseen_by_counterpart);
    }
}
