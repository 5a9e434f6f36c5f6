//! # ember-shared
//!
//! Types shared between the storage layer and the server: identifiers,
//! gender/preference enums, public profile summaries, and the tagged
//! real-time event protocol pushed to connected clients.

pub mod protocol;
pub mod types;

pub use protocol::{Message, ServerEvent};
pub use types::{Gender, GenderPreference, MatchSummary, MessageId, ProfileSummary, UserId};
