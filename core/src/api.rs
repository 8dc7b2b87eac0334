//! The transport seam between the cart engine and the storefront backend.
//!
//! The engine only knows this trait; the real `reqwest` client lives in
//! `tavolo-backend-client`, and scenario tests inject a recording mock.

use async_trait::async_trait;
use tavolo_protocol::{Cart, Identity, NewLineItem, TransferRequest};

/// Failure surfaced by the cart transport.
///
/// `Clone` so the pending-operation ledger can hand one settled outcome to
/// every caller that raced on the same request key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiFailure {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend rejected request ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Remote cart operations, keyed by the caller's identity.
///
/// Mutations return the cart snapshot when the backend embeds one in its
/// response; `Ok(None)` tells the engine to fall back to a re-fetch.
#[async_trait]
pub trait CartApi: Send + Sync {
    async fn fetch_cart(&self, identity: &Identity) -> Result<Cart, ApiFailure>;

    async fn add_item(
        &self,
        identity: &Identity,
        item: &NewLineItem,
    ) -> Result<Option<Cart>, ApiFailure>;

    async fn update_item(
        &self,
        identity: &Identity,
        line_id: &str,
        quantity: u32,
    ) -> Result<Option<Cart>, ApiFailure>;

    async fn remove_item(
        &self,
        identity: &Identity,
        line_id: &str,
    ) -> Result<Option<Cart>, ApiFailure>;

    async fn clear_cart(&self, identity: &Identity) -> Result<(), ApiFailure>;

    /// Transfer a guest cart's lines to the authenticated identity.
    async fn transfer_cart(&self, request: &TransferRequest) -> Result<Cart, ApiFailure>;
}
