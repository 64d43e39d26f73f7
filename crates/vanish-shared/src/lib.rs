//! # vanish-shared
//!
//! Domain types shared by every Vanish crate: identifiers, the typed
//! records exchanged between the API server and the client cache, the
//! realtime event payloads broadcast on conversation channels, and the
//! handful of product-wide constants (default message expiry, edit
//! window, page size).

pub mod api;
pub mod constants;
pub mod events;
pub mod records;
pub mod types;

mod error;

pub use error::ValidationError;
