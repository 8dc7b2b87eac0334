//! Engine-level error type.

use tavolo_protocol::{MAX_LINE_QUANTITY, MIN_LINE_QUANTITY};

use crate::api::ApiFailure;

/// Error returned by cart engine operations.
///
/// `Clone` is required: the pending-operation ledger resolves every caller
/// racing on one request key with the same outcome, so source errors are
/// flattened to strings at this boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("quantity {quantity} is out of range ({MIN_LINE_QUANTITY}-{MAX_LINE_QUANTITY})")]
    InvalidQuantity { quantity: u32 },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("cart request failed: {0}")]
    Api(String),

    #[error("cart engine is not initialized")]
    NotReady,
}

impl From<ApiFailure> for CartError {
    fn from(failure: ApiFailure) -> Self {
        CartError::Api(failure.to_string())
    }
}
