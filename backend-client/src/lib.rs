//! REST client for the storefront cart API.
//!
//! Implements the [`CartApi`] seam consumed by the cart engine: one method
//! per endpoint, with a guest route (keyed by session id) and an
//! authenticated route (keyed by the bearer credential) chosen from the
//! caller's identity. Every response is the `{success, data, message}`
//! envelope; mutation responses that embed the updated cart are preferred,
//! and a missing snapshot is reported as `Ok(None)` so the engine can fall
//! back to a re-fetch.

use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use tavolo_core::api::{ApiFailure, CartApi};
use tavolo_protocol::{ApiEnvelope, Cart, CartPayload, Identity, NewLineItem, TransferRequest};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend rejected request ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ApiError> for ApiFailure {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Network(e) => ApiFailure::Network(e.to_string()),
            ApiError::Backend { status, message } => ApiFailure::Backend { status, message },
            ApiError::InvalidResponse(message) => ApiFailure::InvalidResponse(message),
        }
    }
}

/// HTTP client for the cart endpoints.
pub struct CartClient {
    http: reqwest::Client,
    base_url: String,
    bearer: RwLock<Option<String>>,
}

impl CartClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            bearer: RwLock::new(None),
        }
    }

    /// Install or clear the credential attached to authenticated routes.
    pub fn set_bearer_token(&self, token: Option<String>) {
        let mut bearer = self.bearer.write().unwrap_or_else(|e| e.into_inner());
        *bearer = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.bearer.read().unwrap_or_else(|e| e.into_inner());
        match bearer.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn cart_url(&self, identity: &Identity) -> String {
        match identity {
            Identity::Guest { session_id } => self.url(&format!("/guest/cart/{session_id}")),
            Identity::Authenticated { .. } => self.url("/cart"),
        }
    }

    fn items_url(&self, identity: &Identity, line_id: Option<&str>) -> String {
        let suffix = line_id.map(|id| format!("/{id}")).unwrap_or_default();
        match identity {
            Identity::Guest { session_id } => match line_id {
                // Guest adds post to the cart resource itself.
                None => self.url(&format!("/guest/cart/{session_id}")),
                Some(_) => self.url(&format!("/guest/cart/{session_id}/items{suffix}")),
            },
            Identity::Authenticated { .. } => self.url(&format!("/cart/items{suffix}")),
        }
    }

    /// Execute a request and decode the cart envelope. `Ok(None)` means the
    /// backend acknowledged the operation without embedding a snapshot.
    async fn send_cart(&self, request: RequestBuilder) -> Result<Option<Cart>, ApiError> {
        let response = self.authorize(request).send().await?;
        decode_cart_envelope(response).await
    }
}

async fn decode_cart_envelope(response: Response) -> Result<Option<Cart>, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::Backend {
            status: status.as_u16(),
            message: error_message(&body, status),
        });
    }

    let envelope: ApiEnvelope<CartPayload> = serde_json::from_str(&body)
        .map_err(|e| ApiError::InvalidResponse(format!("malformed envelope: {e}")))?;
    if !envelope.success {
        return Err(ApiError::Backend {
            status: status.as_u16(),
            message: envelope
                .message
                .unwrap_or_else(|| "request failed".to_string()),
        });
    }
    Ok(envelope.data.map(CartPayload::into_cart))
}

fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .and_then(|envelope| envelope.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        })
}

#[derive(serde::Serialize)]
struct QuantityBody {
    quantity: u32,
}

#[async_trait]
impl CartApi for CartClient {
    async fn fetch_cart(&self, identity: &Identity) -> Result<Cart, ApiFailure> {
        let request = self.http.get(self.cart_url(identity));
        let cart = self.send_cart(request).await.map_err(ApiFailure::from)?;
        cart.ok_or_else(|| ApiFailure::InvalidResponse("response missing cart snapshot".into()))
    }

    async fn add_item(
        &self,
        identity: &Identity,
        item: &NewLineItem,
    ) -> Result<Option<Cart>, ApiFailure> {
        let request = self.http.post(self.items_url(identity, None)).json(item);
        self.send_cart(request).await.map_err(ApiFailure::from)
    }

    async fn update_item(
        &self,
        identity: &Identity,
        line_id: &str,
        quantity: u32,
    ) -> Result<Option<Cart>, ApiFailure> {
        let request = self
            .http
            .put(self.items_url(identity, Some(line_id)))
            .json(&QuantityBody { quantity });
        self.send_cart(request).await.map_err(ApiFailure::from)
    }

    async fn remove_item(
        &self,
        identity: &Identity,
        line_id: &str,
    ) -> Result<Option<Cart>, ApiFailure> {
        let request = self.http.delete(self.items_url(identity, Some(line_id)));
        self.send_cart(request).await.map_err(ApiFailure::from)
    }

    async fn clear_cart(&self, identity: &Identity) -> Result<(), ApiFailure> {
        let request = self.http.delete(self.cart_url(identity));
        self.send_cart(request).await.map_err(ApiFailure::from)?;
        Ok(())
    }

    async fn transfer_cart(&self, request: &TransferRequest) -> Result<Cart, ApiFailure> {
        let request = self.http.post(self.url("/cart/transfer")).json(request);
        let cart = self.send_cart(request).await.map_err(ApiFailure::from)?;
        cart.ok_or_else(|| ApiFailure::InvalidResponse("response missing merged cart".into()))
    }
}
