//! Domain model structs persisted in the SQLite database.
//!
//! [`Message`] lives in `ember-shared` because it is also a wire payload;
//! it is re-exported here so store callers see one flat model namespace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ember_shared::{Gender, GenderPreference, ProfileSummary, UserId};

pub use ember_shared::Message;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The profile subset the core needs: identity, the fields shown in match
/// payloads, and the two-way gender-preference filter inputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub image: String,
    pub gender: Gender,
    pub gender_preference: GenderPreference,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        gender: Gender,
        gender_preference: GenderPreference,
    ) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            image: image.into(),
            gender,
            gender_preference,
            created_at: Utc::now(),
        }
    }

    /// The public subset sent in match payloads.
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.id,
            name: self.name.clone(),
            image: self.image.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// Directed relationship edge kinds stored in the `relationships` table.
///
/// All kinds are additive-only: a `dislike` does not retract an earlier
/// `like`, and nothing is ever removed.  `Match` rows always exist in
/// symmetric pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    Like,
    Dislike,
    Match,
    Block,
    Mute,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Like => "like",
            RelationshipKind::Dislike => "dislike",
            RelationshipKind::Match => "match",
            RelationshipKind::Block => "block",
            RelationshipKind::Mute => "mute",
        }
    }
}

/// Result of [`Database::record_like`].
///
/// `matched` is true only on the like that completes the mutual pair, never
/// on repeats or later reads.
///
/// [`Database::record_like`]: crate::Database::record_like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeOutcome {
    pub matched: bool,
}

// ---------------------------------------------------------------------------
// Unread flags
// ---------------------------------------------------------------------------

/// Per-match unread badges, computed fresh on every match-list fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnreadFlags {
    /// A message from the counterpart exists that the viewer has not seen.
    pub has_new_message: bool,
    /// A message from the viewer exists that the counterpart has not seen.
    pub has_unseen_by_counterpart: bool,
}
