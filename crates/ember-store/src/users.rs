//! CRUD and candidate-feed queries for [`User`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use ember_shared::{Gender, GenderPreference, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user profile.
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, name, image, gender, gender_preference, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.name,
                user.image,
                user.gender.as_str(),
                user.gender_preference.as_str(),
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by id.
    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, name, image, gender, gender_preference, created_at
                 FROM users
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Whether a user with this id exists.
    pub fn user_exists(&self, id: UserId) -> Result<bool> {
        let exists: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// The swipe feed for `viewer`: every user except the viewer themself
    /// and everyone they already liked, disliked, or matched, filtered by
    /// two-way gender-preference compatibility.
    ///
    /// Ordering is storage order; the result is a finite, re-queryable
    /// sequence rather than a paginated stream.
    pub fn candidate_profiles(&self, viewer: UserId) -> Result<Vec<User>> {
        let me = self.get_user(viewer)?;

        let mut stmt = self.conn().prepare(
            "SELECT u.id, u.name, u.image, u.gender, u.gender_preference, u.created_at
             FROM users u
             WHERE u.id != ?1
               AND u.id NOT IN (
                   SELECT target_id FROM relationships
                   WHERE user_id = ?1 AND kind IN ('like', 'dislike', 'match')
               )
               AND (?2 = 'both' OR u.gender = ?2)
               AND (u.gender_preference = 'both' OR u.gender_preference = ?3)",
        )?;

        let rows = stmt.query_map(
            params![
                viewer.to_string(),
                me.gender_preference.as_str(),
                me.gender.as_str(),
            ],
            row_to_user,
        )?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let image: String = row.get(2)?;
    let gender_str: String = row.get(3)?;
    let pref_str: String = row.get(4)?;
    let created_str: String = row.get(5)?;

    let id = UserId::parse(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let gender = Gender::from_str(&gender_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("invalid gender: {gender_str}").into(),
        )
    })?;

    let gender_preference = GenderPreference::from_str(&pref_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("invalid gender preference: {pref_str}").into(),
        )
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id,
        name,
        image,
        gender,
        gender_preference,
        created_at,
    })
}
