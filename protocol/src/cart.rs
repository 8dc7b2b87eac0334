//! Cart snapshot and derived totals.
//!
//! The cart is replaced wholesale whenever a network response or a
//! cross-context broadcast supplies a newer snapshot. Derived fields
//! (subtotal, tax, delivery fee, total, line/quantity counts) are never set
//! independently; `Cart::recompute_totals` is the only code path allowed to
//! touch them.

use serde::{Deserialize, Serialize};

/// Sales tax applied to the pre-fee subtotal.
pub const TAX_RATE: f64 = 0.05;

/// Flat delivery fee, waived at or above [`FREE_DELIVERY_THRESHOLD`].
pub const DELIVERY_FEE: f64 = 2.99;

/// Pre-tax subtotal at which delivery becomes free.
pub const FREE_DELIVERY_THRESHOLD: f64 = 25.00;

/// Inclusive quantity bounds for a single cart line.
pub const MIN_LINE_QUANTITY: u32 = 1;
pub const MAX_LINE_QUANTITY: u32 = 10;

/// Round a monetary amount to whole cents.
///
/// Applied after every derivation so snapshots compare exactly.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// An addon attached to a cart line (extra cheese, side sauce, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addon {
    pub id: String,
    pub name: String,
    pub price: f64,
}

/// One cart entry.
///
/// `unit_price` is a snapshot taken at add time and stays fixed even if the
/// catalog price later changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Opaque line id assigned by the remote store.
    pub id: String,
    pub menu_item_id: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default)]
    pub addons: Vec<Addon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    pub unit_price: f64,
    #[serde(default)]
    pub line_total: f64,
}

impl CartLine {
    /// Per-unit price including addon costs.
    pub fn unit_price_with_addons(&self) -> f64 {
        let addons: f64 = self.addons.iter().map(|a| a.price).sum();
        self.unit_price + addons
    }

    fn recompute_line_total(&mut self) {
        self.line_total = round_cents(self.unit_price_with_addons() * f64::from(self.quantity));
    }
}

/// The authoritative shopping-cart snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub delivery_fee: f64,
    #[serde(default)]
    pub total: f64,
    /// Unique line count, derived from `items`.
    #[serde(default)]
    pub total_items: usize,
    /// Sum of line quantities, derived from `items`.
    #[serde(default)]
    pub total_quantity: u32,
}

impl Cart {
    /// The safe fallback snapshot: no lines, zero totals.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: 0.0,
            tax: 0.0,
            delivery_fee: 0.0,
            total: 0.0,
            total_items: 0,
            total_quantity: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Re-derive every monetary and count field from `items`.
    ///
    /// Runs after every successful mutation and after every externally
    /// supplied snapshot; the cart is never patched incrementally.
    pub fn recompute_totals(&mut self) {
        for line in &mut self.items {
            line.recompute_line_total();
        }
        self.subtotal = round_cents(self.items.iter().map(|l| l.line_total).sum());
        self.tax = round_cents(self.subtotal * TAX_RATE);
        self.delivery_fee = if self.items.is_empty() || self.subtotal >= FREE_DELIVERY_THRESHOLD {
            0.0
        } else {
            DELIVERY_FEE
        };
        self.total = round_cents(self.subtotal + self.tax + self.delivery_fee);
        self.total_items = self.items.len();
        self.total_quantity = self.items.iter().map(|l| l.quantity).sum();
    }
}

/// Request body for adding a line to the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLineItem {
    pub menu_item_id: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default)]
    pub addons: Vec<Addon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

impl NewLineItem {
    pub fn new(menu_item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            menu_item_id: menu_item_id.into(),
            quantity,
            size: None,
            addons: Vec::new(),
            special_instructions: None,
        }
    }

    /// Deterministic key identifying this request for in-flight
    /// deduplication. Addon order does not affect the key.
    pub fn canonical_key(&self) -> String {
        let mut addon_ids: Vec<&str> = self.addons.iter().map(|a| a.id.as_str()).collect();
        addon_ids.sort_unstable();
        format!(
            "add:{}:{}:{}:{}:{}",
            self.menu_item_id,
            self.quantity,
            self.size.as_deref().unwrap_or("-"),
            if addon_ids.is_empty() {
                "-".to_string()
            } else {
                addon_ids.join("+")
            },
            self.special_instructions.as_deref().unwrap_or("-"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(id: &str, qty: u32, unit: f64) -> CartLine {
        CartLine {
            id: id.to_string(),
            menu_item_id: format!("menu-{id}"),
            quantity: qty,
            size: None,
            addons: Vec::new(),
            special_instructions: None,
            unit_price: unit,
            line_total: 0.0,
        }
    }

    #[test]
    fn recompute_derives_all_fields() {
        let mut cart = Cart {
            items: vec![line("a", 2, 4.5), line("b", 1, 3.0)],
            ..Cart::empty()
        };
        cart.recompute_totals();

        assert_eq!(12.0, cart.subtotal);
        assert_eq!(0.6, cart.tax);
        assert_eq!(DELIVERY_FEE, cart.delivery_fee);
        assert_eq!(15.59, cart.total);
        assert_eq!(2, cart.total_items);
        assert_eq!(3, cart.total_quantity);
    }

    #[test]
    fn delivery_fee_waived_at_threshold() {
        let mut cart = Cart {
            items: vec![line("a", 5, 5.0)],
            ..Cart::empty()
        };
        cart.recompute_totals();

        assert_eq!(25.0, cart.subtotal);
        assert_eq!(0.0, cart.delivery_fee);
    }

    #[test]
    fn empty_cart_has_zero_fee_and_totals() {
        let mut cart = Cart::empty();
        cart.recompute_totals();

        assert_eq!(Cart::empty(), cart);
    }

    #[test]
    fn addons_priced_into_line_total() {
        let mut item = line("a", 2, 10.0);
        item.addons.push(Addon {
            id: "cheese".to_string(),
            name: "Extra cheese".to_string(),
            price: 1.25,
        });
        let mut cart = Cart {
            items: vec![item],
            ..Cart::empty()
        };
        cart.recompute_totals();

        assert_eq!(22.5, cart.items[0].line_total);
        assert_eq!(22.5, cart.subtotal);
    }

    #[test]
    fn rounding_applied_to_derived_fields() {
        // 3 * 3.333 = 9.999 -> 10.00 after cent rounding.
        let mut cart = Cart {
            items: vec![line("a", 3, 3.333)],
            ..Cart::empty()
        };
        cart.recompute_totals();

        assert_eq!(10.0, cart.items[0].line_total);
        assert_eq!(10.0, cart.subtotal);
        assert_eq!(0.5, cart.tax);
    }

    #[test]
    fn canonical_key_is_order_insensitive_for_addons() {
        let mut a = NewLineItem::new("m1", 2);
        a.size = Some("large".to_string());
        a.addons = vec![
            Addon {
                id: "z".into(),
                name: "Z".into(),
                price: 0.5,
            },
            Addon {
                id: "a".into(),
                name: "A".into(),
                price: 0.5,
            },
        ];
        let mut b = a.clone();
        b.addons.reverse();

        assert_eq!(a.canonical_key(), b.canonical_key());
        assert_eq!("add:m1:2:large:a+z:-", a.canonical_key());
    }

    #[test]
    fn canonical_key_distinguishes_notes() {
        let mut a = NewLineItem::new("m1", 1);
        let b = a.clone();
        a.special_instructions = Some("no onions".to_string());

        assert_ne!(a.canonical_key(), b.canonical_key());
    }
}
