//! Pending-operation ledger.
//!
//! Maps a mutation's canonical request key to its in-flight shared outcome.
//! A second caller issuing an identical request before the first settles
//! awaits the same future instead of issuing a duplicate network call.
//! Entries are removed as soon as the operation settles and are never
//! persisted.

use std::collections::HashMap;

use futures::future::{BoxFuture, Shared};
use tavolo_protocol::Cart;

use crate::error::CartError;

/// The outcome shared by every caller racing on one request key.
pub(crate) type SharedOutcome = Shared<BoxFuture<'static, Result<Cart, CartError>>>;

#[derive(Default)]
pub(crate) struct OpLedger {
    pending: HashMap<String, SharedOutcome>,
}

impl OpLedger {
    pub(crate) fn get(&self, key: &str) -> Option<SharedOutcome> {
        self.pending.get(key).cloned()
    }

    pub(crate) fn insert(&mut self, key: String, outcome: SharedOutcome) {
        self.pending.insert(key, outcome);
    }

    pub(crate) fn settle(&mut self, key: &str) {
        self.pending.remove(key);
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Canonical key for a quantity update.
pub(crate) fn update_key(line_id: &str, quantity: u32) -> String {
    format!("update:{line_id}:{quantity}")
}

/// Canonical key for a line removal.
pub(crate) fn remove_key(line_id: &str) -> String {
    format!("remove:{line_id}")
}

/// Canonical key for clearing the cart.
pub(crate) fn clear_key() -> String {
    "clear".to_string()
}
