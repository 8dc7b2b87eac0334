//! Shared data model for the tavolo cart synchronization engine.
//!
//! Everything that crosses a crate boundary lives here: the cart snapshot
//! and its derived totals, identity and session records, and the JSON
//! envelope shapes spoken by the storefront REST API.

mod cart;
mod identity;
mod session;
mod wire;

pub use cart::{
    Addon, Cart, CartLine, NewLineItem, DELIVERY_FEE, FREE_DELIVERY_THRESHOLD, MAX_LINE_QUANTITY,
    MIN_LINE_QUANTITY, TAX_RATE, round_cents,
};
pub use identity::{AuthState, AuthToken, Identity, UserRecord};
pub use session::{SessionKind, SessionRecord, session_max_age};
pub use wire::{ApiEnvelope, CartPayload, TransferItem, TransferRequest};
