//! Identity-transition merge: moves a guest cart's lines into the newly
//! authenticated user's cart, exactly once per login.

use tavolo_protocol::{Cart, TransferRequest, UserRecord};
use tracing::{info, warn};

use crate::storage::CART_KEY;

use super::EngineInner;

impl EngineInner {
    /// Submit the guest cart to the transfer endpoint.
    ///
    /// The merge guard (`last_merged_user`) was set by the caller before
    /// this point, so a duplicate `Authenticated` event cannot re-submit
    /// the same lines. On success the guest frame is discarded and the
    /// merged cart adopted; on failure the guest cart is left untouched
    /// and the guard cleared so a later login attempt can retry — a failed
    /// merge never silently drops items.
    pub(super) async fn merge_guest_cart(&self, user: &UserRecord, guest_cart: &Cart) {
        let request = TransferRequest::from_cart(guest_cart);
        match self.api.transfer_cart(&request).await {
            Ok(merged) => {
                if let Err(e) = self.storage.remove(CART_KEY) {
                    warn!("failed to discard guest cart frame after merge: {e}");
                }
                info!(
                    user_id = %user.id,
                    lines = request.temp_cart_items.len(),
                    "guest cart merged into authenticated cart"
                );
                self.adopt_snapshot(merged, true).await;
            }
            Err(e) => {
                warn!(user_id = %user.id, "guest cart merge failed, keeping guest cart: {e}");
                let mut st = self.state.lock().await;
                st.last_merged_user = None;
            }
        }
    }
}
