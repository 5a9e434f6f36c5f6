//! # ember-store
//!
//! SQLite persistence for the matching and messaging core.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every domain area:
//! user profiles, swipe relationships (likes / dislikes / matches / blocks /
//! mutes), and the per-pair message log with its seen-by sets.
//!
//! The store is the sole writer of these records.  Match formation runs as a
//! single transaction so the symmetric `matches` rows can never diverge
//! under concurrent likes.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod relationships;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
