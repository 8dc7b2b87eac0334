//! JSON envelope shapes spoken by the storefront REST API.

use serde::{Deserialize, Serialize};

use crate::cart::{Addon, Cart, CartLine};

/// The `{success, data, message}` envelope wrapping every API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Cart payloads arrive either bare (`data: {...}`) or nested under a `cart`
/// field (`data: {cart: {...}}`), depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CartPayload {
    Wrapped { cart: Cart },
    Bare(Cart),
}

impl CartPayload {
    pub fn into_cart(self) -> Cart {
        match self {
            CartPayload::Wrapped { cart } => cart,
            CartPayload::Bare(cart) => cart,
        }
    }
}

/// One guest cart line submitted to the transfer endpoint at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub menu_item_id: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default)]
    pub addons: Vec<Addon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

impl From<&CartLine> for TransferItem {
    fn from(line: &CartLine) -> Self {
        Self {
            menu_item_id: line.menu_item_id.clone(),
            quantity: line.quantity,
            size: line.size.clone(),
            addons: line.addons.clone(),
            special_instructions: line.special_instructions.clone(),
        }
    }
}

/// Body of `POST /cart/transfer`: the guest cart handed to the
/// newly authenticated identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub temp_cart_items: Vec<TransferItem>,
}

impl TransferRequest {
    pub fn from_cart(cart: &Cart) -> Self {
        Self {
            temp_cart_items: cart.items.iter().map(TransferItem::from).collect(),
        }
    }
}
