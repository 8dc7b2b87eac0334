//! Client-side cart synchronization and identity-transition engine.
//!
//! One [`engine::CartEngine`] instance owns the authoritative cart snapshot
//! for one browsing context. It reconciles the snapshot against the remote
//! store through the [`api::CartApi`] seam, suppresses duplicate in-flight
//! mutations, propagates changes to sibling contexts over a
//! [`broadcast::ContextBroadcast`] channel, and merges a guest cart into
//! the authenticated user's cart at login.

pub mod api;
pub mod broadcast;
pub mod engine;
pub mod error;
pub mod identity;
pub mod session;
pub mod storage;

pub use api::{ApiFailure, CartApi};
pub use broadcast::{BroadcastEvent, BroadcastFrame, ContextBroadcast, LocalBus, StorageBroadcast};
pub use engine::{AUTH_REFRESH_DEBOUNCE, CartEngine, FRESHNESS_WINDOW};
pub use error::CartError;
pub use identity::{AuthEvent, IdentityResolver};
pub use session::SessionStore;
pub use storage::{CachedCart, StorageDir, StorageError};
