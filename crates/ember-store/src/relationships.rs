//! Swipe relationships and atomic match formation.
//!
//! All relationship kinds are additive-only and idempotent.  Match
//! formation is the one multi-row write in the store: the completing like
//! and both symmetric `match` rows are committed in a single transaction,
//! so concurrent likes between the same pair can neither double-create a
//! match nor leave it asymmetric.

use chrono::Utc;
use rusqlite::{params, Transaction};

use ember_shared::UserId;

use crate::database::Database;
use crate::error::Result;
use crate::models::{LikeOutcome, RelationshipKind};

impl Database {
    /// Record that `actor` liked `target`.
    ///
    /// A repeat like is a silent no-op.  Returns `matched = true` only on
    /// the transition edge, i.e. the like that completes the mutual pair.
    pub fn record_like(&mut self, actor: UserId, target: UserId) -> Result<LikeOutcome> {
        let tx = self.conn_mut().transaction()?;

        let inserted = insert_edge(&tx, actor, target, RelationshipKind::Like)?;

        let mut matched = false;
        if inserted {
            let reverse: bool = tx.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM relationships
                     WHERE user_id = ?1 AND target_id = ?2 AND kind = 'like'
                 )",
                params![target.to_string(), actor.to_string()],
                |row| row.get(0),
            )?;

            if reverse {
                // Both directions in the same transaction keeps `matches`
                // symmetric under concurrent likes.
                insert_edge(&tx, actor, target, RelationshipKind::Match)?;
                insert_edge(&tx, target, actor, RelationshipKind::Match)?;
                matched = true;
            }
        }

        tx.commit()?;

        if matched {
            tracing::info!(actor = %actor, target = %target, "mutual match formed");
        }

        Ok(LikeOutcome { matched })
    }

    /// Record that `actor` disliked `target`.  Idempotent, and deliberately
    /// does not retract an earlier like (the dislike set only grows).
    pub fn record_dislike(&self, actor: UserId, target: UserId) -> Result<()> {
        self.insert_edge_plain(actor, target, RelationshipKind::Dislike)
    }

    /// Add `target` to `actor`'s block set.  Additive-only.
    pub fn record_block(&self, actor: UserId, target: UserId) -> Result<()> {
        self.insert_edge_plain(actor, target, RelationshipKind::Block)
    }

    /// Add `target` to `actor`'s mute set.  Additive-only.
    pub fn record_mute(&self, actor: UserId, target: UserId) -> Result<()> {
        self.insert_edge_plain(actor, target, RelationshipKind::Mute)
    }

    /// Whether a mutual match exists between the two users.
    pub fn are_matched(&self, a: UserId, b: UserId) -> Result<bool> {
        let matched: bool = self.conn().query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM relationships
                 WHERE user_id = ?1 AND target_id = ?2 AND kind = 'match'
             )",
            params![a.to_string(), b.to_string()],
            |row| row.get(0),
        )?;
        Ok(matched)
    }

    /// Ids of everyone matched with `user`, in match-formation order.
    pub fn matches_of(&self, user: UserId) -> Result<Vec<UserId>> {
        let mut stmt = self.conn().prepare(
            "SELECT target_id FROM relationships
             WHERE user_id = ?1 AND kind = 'match'
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![user.to_string()], |row| {
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

    fn insert_edge_plain(
        &self,
        actor: UserId,
        target: UserId,
        kind: RelationshipKind,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO relationships (user_id, target_id, kind, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                actor.to_string(),
                target.to_string(),
                kind.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

/// Insert a relationship edge inside an open transaction.  Returns whether
/// a row was actually inserted (false on idempotent repeats).
fn insert_edge(
    tx: &Transaction<'_>,
    actor: UserId,
    target: UserId,
    kind: RelationshipKind,
) -> Result<bool> {
    let affected = tx.execute(
        "INSERT OR IGNORE INTO relationships (user_id, target_id, kind, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            actor.to_string(),
            target.to_string(),
            kind.as_str(),
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(affected > 0)
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
            Gender::Female,
            GenderPreference::Both,
        );
        db.create_user(&user).unwrap();
        user.id
    }

    #[test]
    fn single_like_does_not_match() {
        let mut db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        let outcome = db.record_like(a, b).unwrap();
        assert!(!outcome.matched);
        assert!(!db.are_matched(a, b).unwrap());
    }

    #[test]
    fn mutual_like_matches_symmetrically() {
        let mut db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        assert!(!db.record_like(a, b).unwrap().matched);
        assert!(db.record_like(b, a).unwrap().matched);

        assert!(db.are_matched(a, b).unwrap());
        assert!(db.are_matched(b, a).unwrap());
        assert_eq!(db.matches_of(a).unwrap(), vec![b]);
        assert_eq!(db.matches_of(b).unwrap(), vec![a]);
    }

    #[test]
    fn matched_fires_only_on_transition_edge() {
        let mut db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        db.record_like(a, b).unwrap();
        assert!(db.record_like(b, a).unwrap().matched);

        // Repeats after the match are silent no-ops.
        assert!(!db.record_like(b, a).unwrap().matched);
        assert!(!db.record_like(a, b).unwrap().matched);
        assert_eq!(db.matches_of(a).unwrap(), vec![b]);
    }

    #[test]
    fn repeat_like_is_idempotent() {
        let mut db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        db.record_like(a, b).unwrap();
        db.record_like(a, b).unwrap();

        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM relationships WHERE kind = 'like'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn dislike_does_not_retract_like() {
        let mut db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        db.record_like(a, b).unwrap();
        db.record_dislike(a, b).unwrap();

        // The earlier like still stands, so B's like completes the match.
        assert!(db.record_like(b, a).unwrap().matched);
    }

    #[test]
    fn block_and_mute_are_additive() {
        let db = test_db();
        let a = add_user(&db, "a");
        let b = add_user(&db, "b");

        db.record_block(a, b).unwrap();
        db.record_block(a, b).unwrap();
        db.record_mute(a, b).unwrap();

        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM relationships WHERE kind IN ('block', 'mute')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
