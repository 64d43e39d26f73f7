//! # vanish-store
//!
//! Relational persistence for Vanish, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle wrapping a
//! `rusqlite::Connection` with typed CRUD helpers for every domain table:
//! profiles, sessions, conversations, participants, messages,
//! notifications, and the social surface (posts, comments, followers).
//! Schema migrations run automatically on open.
//!
//! Row-level authorization rules that a hosted database would express as
//! policies (sender-or-admin message deletion, pending-only invitation
//! updates) are expressed here as guarded SQL, so callers observe the same
//! zero-rows-affected semantics.

pub mod comments;
pub mod conversations;
pub mod database;
pub mod followers;
pub mod messages;
pub mod migrations;
pub mod notifications;
pub mod participants;
pub mod posts;
pub mod profiles;
pub mod sessions;

mod convert;
mod error;

#[cfg(test)]
pub(crate) mod test_support;

pub use database::Database;
pub use error::StoreError;
