//! # vanish-client
//!
//! Client core for the Vanish social network: a typed query cache, the
//! optimistic message pipeline, and the realtime merge listener that
//! reconciles broadcast events into the same cache.
//!
//! The cache is an explicit, injectable store: every consumer receives a
//! handle rather than reaching for ambient global state, so tests can
//! instantiate isolated stores per case.  Rendering is out of scope; the
//! UI subscribes to cache change notifications and reads snapshots.

pub mod api;
pub mod cache;
pub mod listener;
pub mod notices;
pub mod pipeline;
pub mod state;

mod error;

pub use cache::{CacheEntry, CacheKey, CachedMessage, DeliveryState, QueryCache};
pub use error::ClientError;
