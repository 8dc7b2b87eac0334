//! The cart engine.
//!
//! Owns the in-memory cart snapshot for one browsing context, talks to the
//! remote cart endpoint for the current identity, deduplicates concurrent
//! mutations through the pending-operation ledger, debounces reactive
//! refreshes, and fans out change notifications. Constructed explicitly by
//! the application root with its collaborators injected; there is no
//! ambient global instance.

mod ledger;
mod merge;
mod scheduler;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tavolo_protocol::{
    Cart, Identity, MAX_LINE_QUANTITY, MIN_LINE_QUANTITY, NewLineItem, SessionKind, SessionRecord,
};
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::api::{ApiFailure, CartApi};
use crate::broadcast::{BroadcastEvent, ContextBroadcast};
use crate::error::CartError;
use crate::identity::{AuthEvent, IdentityResolver};
use crate::storage::{CART_KEY, CachedCart, StorageDir, cart_max_age};

use ledger::{OpLedger, SharedOutcome};
use scheduler::DebounceScheduler;

/// A snapshot younger than this is served without a remote fetch.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(2);

/// Quiet period collapsing bursts of auth-state triggers into one refresh.
pub const AUTH_REFRESH_DEBOUNCE: Duration = Duration::from_secs(3);

const AUTH_REFRESH_KEY: &str = "auth-refresh";

type InitOutcome = Shared<BoxFuture<'static, Result<(), CartError>>>;

/// The cart synchronization engine for one browsing context.
///
/// Must be constructed inside a tokio runtime: construction spawns the
/// listener tasks reacting to auth transitions and cross-context frames.
pub struct CartEngine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    weak_self: Weak<EngineInner>,
    api: Arc<dyn CartApi>,
    storage: StorageDir,
    channel: Arc<dyn ContextBroadcast>,
    cart_tx: broadcast::Sender<Cart>,
    auth_tx: broadcast::Sender<AuthEvent>,
    scheduler: DebounceScheduler,
    fetches_in_flight: AtomicU32,
    mutations_in_flight: AtomicU32,
    state: Mutex<EngineState>,
}

struct EngineState {
    resolver: IdentityResolver,
    identity: Identity,
    cart: Cart,
    ready: bool,
    init: Option<InitOutcome>,
    ledger: OpLedger,
    last_fetch: Option<Instant>,
    /// Guard for the identity-transition merge: the user id whose login
    /// already consumed the guest cart.
    last_merged_user: Option<String>,
}

/// Counter increment that reverses itself on drop. A caller abandoning a
/// fetch mid-await (timeout, `select!`) must not leave the in-flight
/// accounting pinned, or every later read would serve the stale cache.
struct InFlightGuard<'a> {
    counter: &'a AtomicU32,
}

impl<'a> InFlightGuard<'a> {
    fn begin(counter: &'a AtomicU32) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CartEngine {
    pub fn new(
        api: Arc<dyn CartApi>,
        storage: StorageDir,
        channel: Arc<dyn ContextBroadcast>,
    ) -> Self {
        let mut resolver = IdentityResolver::new(storage.clone());
        let identity = resolver.current();
        let auth_tx = resolver.sender();
        let (cart_tx, _) = broadcast::channel(32);

        let inner = Arc::new_cyclic(|weak| EngineInner {
            weak_self: weak.clone(),
            api,
            storage,
            channel,
            cart_tx,
            auth_tx,
            scheduler: DebounceScheduler::new(),
            fetches_in_flight: AtomicU32::new(0),
            mutations_in_flight: AtomicU32::new(0),
            state: Mutex::new(EngineState {
                resolver,
                identity,
                cart: Cart::empty(),
                ready: false,
                init: None,
                ledger: OpLedger::default(),
                last_fetch: None,
                last_merged_user: None,
            }),
        });
        EngineInner::spawn_listeners(&inner);
        Self { inner }
    }

    /// Change notifications: one snapshot per logical change. Fan-out goes
    /// through a channel, so a subscriber's side effects cannot re-enter
    /// notification.
    pub fn subscribe(&self) -> broadcast::Receiver<Cart> {
        self.inner.cart_tx.subscribe()
    }

    /// Auth transition notifications for the rendering layer.
    pub fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.auth_tx.subscribe()
    }

    /// Idempotent initialization: concurrent callers collapse onto a single
    /// in-flight future held until it settles.
    pub async fn init(&self) -> Result<(), CartError> {
        let outcome = {
            let mut st = self.inner.state.lock().await;
            if st.ready {
                return Ok(());
            }
            match &st.init {
                Some(existing) => existing.clone(),
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fut: InitOutcome = async move { inner.run_init().await }.boxed().shared();
                    st.init = Some(fut.clone());
                    fut
                }
            }
        };
        outcome.await
    }

    /// The current snapshot, fetched remotely only when no fetch is in
    /// flight and the last successful one is older than the freshness
    /// window. Never rejects: on failure the cached (or empty) snapshot is
    /// returned so the UI always has something renderable.
    pub async fn get_cart(&self) -> Cart {
        enum Plan<'g> {
            Cached(Cart),
            Fetch {
                identity: Identity,
                fallback: Cart,
                guard: InFlightGuard<'g>,
            },
        }

        let plan = {
            let st = self.inner.state.lock().await;
            let fresh = st
                .last_fetch
                .is_some_and(|at| at.elapsed() < FRESHNESS_WINDOW);
            if fresh || self.inner.fetches_in_flight.load(Ordering::SeqCst) > 0 {
                Plan::Cached(st.cart.clone())
            } else {
                Plan::Fetch {
                    identity: st.identity.clone(),
                    fallback: st.cart.clone(),
                    guard: InFlightGuard::begin(&self.inner.fetches_in_flight),
                }
            }
        };

        match plan {
            Plan::Cached(cart) => cart,
            Plan::Fetch {
                identity,
                fallback,
                guard,
            } => {
                let result = self.inner.api.fetch_cart(&identity).await;
                if result.is_ok() {
                    self.inner.state.lock().await.last_fetch = Some(Instant::now());
                }
                drop(guard);
                match result {
                    Ok(cart) => self.inner.adopt_snapshot(cart, true).await,
                    Err(e) => {
                        warn!("cart fetch failed, serving cached snapshot: {e}");
                        fallback
                    }
                }
            }
        }
    }

    pub async fn add_item(&self, item: NewLineItem) -> Result<Cart, CartError> {
        if !(MIN_LINE_QUANTITY..=MAX_LINE_QUANTITY).contains(&item.quantity) {
            return Err(CartError::InvalidQuantity {
                quantity: item.quantity,
            });
        }
        if item.menu_item_id.is_empty() {
            return Err(CartError::Validation("menu item id is required".into()));
        }
        let key = item.canonical_key();
        self.inner
            .clone()
            .run_mutation(key, move |api, identity| async move {
                api.add_item(&identity, &item).await
            })
            .await
    }

    /// Update a line's quantity. Zero is equivalent to removal; anything
    /// above the maximum is rejected before any network call.
    pub async fn update_item(&self, line_id: &str, quantity: u32) -> Result<Cart, CartError> {
        if quantity == 0 {
            return self.remove_item(line_id).await;
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity { quantity });
        }
        if line_id.is_empty() {
            return Err(CartError::Validation("line id is required".into()));
        }
        let key = ledger::update_key(line_id, quantity);
        let line_id = line_id.to_string();
        self.inner
            .clone()
            .run_mutation(key, move |api, identity| async move {
                api.update_item(&identity, &line_id, quantity).await
            })
            .await
    }

    pub async fn remove_item(&self, line_id: &str) -> Result<Cart, CartError> {
        if line_id.is_empty() {
            return Err(CartError::Validation("line id is required".into()));
        }
        let key = ledger::remove_key(line_id);
        let line_id = line_id.to_string();
        self.inner
            .clone()
            .run_mutation(key, move |api, identity| async move {
                api.remove_item(&identity, &line_id).await
            })
            .await
    }

    /// Empty the cart. Best-effort: a failed remote clear still empties the
    /// local snapshot and reports success — a stuck non-empty cart is the
    /// worse failure mode.
    pub async fn clear(&self) -> Result<Cart, CartError> {
        self.inner
            .clone()
            .run_mutation(ledger::clear_key(), move |api, identity| async move {
                match api.clear_cart(&identity).await {
                    Ok(()) => {}
                    Err(e) => {
                        warn!("remote cart clear failed, emptying local snapshot anyway: {e}");
                    }
                }
                Ok(Some(Cart::empty()))
            })
            .await
    }

    /// Re-derive the identity from persisted auth state, reacting to any
    /// transition. Called by the application after login/logout completes.
    pub async fn refresh_identity(&self) {
        let mut st = self.inner.state.lock().await;
        st.resolver.refresh();
    }

    pub async fn is_ready(&self) -> bool {
        self.inner.state.lock().await.ready
    }

    pub async fn current_identity(&self) -> Identity {
        self.inner.state.lock().await.identity.clone()
    }

    /// Number of in-flight mutation entries in the ledger.
    pub async fn pending_operations(&self) -> usize {
        self.inner.state.lock().await.ledger.len()
    }
}

impl EngineInner {
    fn spawn_listeners(inner: &Arc<EngineInner>) {
        use broadcast::error::RecvError;

        let weak = Arc::downgrade(inner);
        let mut auth_rx = inner.auth_tx.subscribe();
        tokio::spawn(async move {
            loop {
                let event = match auth_rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                };
                let Some(inner) = weak.upgrade() else { break };
                inner.handle_auth_event(event).await;
            }
        });

        let weak = Arc::downgrade(inner);
        let mut frame_rx = inner.channel.subscribe();
        tokio::spawn(async move {
            loop {
                let frame = match frame_rx.recv().await {
                    Ok(frame) => frame,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                };
                let Some(inner) = weak.upgrade() else { break };
                if frame.origin == inner.channel.origin() {
                    continue;
                }
                inner.handle_broadcast(frame.event).await;
            }
        });
    }

    async fn run_init(&self) -> Result<(), CartError> {
        let (identity, guard) = {
            let mut st = self.state.lock().await;
            let identity = st.resolver.prime();
            st.identity = identity.clone();
            (identity, InFlightGuard::begin(&self.fetches_in_flight))
        };

        let cached = self.read_cached_cart(&identity);
        let from_cache = cached.is_some();
        let result = match cached {
            Some(cart) => Ok(cart),
            None => self.api.fetch_cart(&identity).await.map_err(CartError::from),
        };

        {
            let mut st = self.state.lock().await;
            st.init = None;
            if result.is_ok() {
                st.ready = true;
                if !from_cache {
                    st.last_fetch = Some(Instant::now());
                }
            }
        }
        drop(guard);

        let cart = result?;
        self.adopt_snapshot(cart, !from_cache).await;
        Ok(())
    }

    /// The persisted cart frame, if it belongs to `identity` and is not
    /// older than the retention window.
    fn read_cached_cart(&self, identity: &Identity) -> Option<Cart> {
        let frame: Option<CachedCart> = match self.storage.read_json(CART_KEY) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("cart cache unreadable, ignoring: {e}");
                None
            }
        };
        frame
            .filter(|f| f.identity_key == identity.cache_key() && !f.is_stale(cart_max_age()))
            .map(|f| f.cart)
    }

    /// Replace the snapshot wholesale: recompute totals, notify
    /// subscribers, and (unless the update originated from a broadcast)
    /// persist the frame and publish it to sibling contexts.
    async fn adopt_snapshot(&self, mut cart: Cart, persist: bool) -> Cart {
        cart.recompute_totals();
        let identity_key = {
            let mut st = self.state.lock().await;
            st.cart = cart.clone();
            st.identity.cache_key()
        };
        if persist {
            let frame = CachedCart::new(cart.clone(), identity_key);
            if let Err(e) = self.storage.write_json(CART_KEY, &frame) {
                warn!("failed to persist cart snapshot, continuing ephemeral: {e}");
            }
            self.channel
                .publish(BroadcastEvent::CartUpdated { cart: cart.clone() });
        }
        let _ = self.cart_tx.send(cart.clone());
        cart
    }

    async fn run_mutation<F, Fut>(self: Arc<Self>, key: String, op: F) -> Result<Cart, CartError>
    where
        F: FnOnce(Arc<dyn CartApi>, Identity) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<Cart>, ApiFailure>> + Send + 'static,
    {
        // Mutations issued while init is still in flight wait for it.
        let pending_init = {
            let st = self.state.lock().await;
            if st.ready { None } else { st.init.clone() }
        };
        match pending_init {
            Some(init) => init.await?,
            None => {
                if !self.state.lock().await.ready {
                    return Err(CartError::NotReady);
                }
            }
        }

        let outcome = {
            let mut st = self.state.lock().await;
            if let Some(existing) = st.ledger.get(&key) {
                debug!(key = %key, "duplicate in-flight mutation suppressed");
                existing
            } else {
                let inner = Arc::clone(&self);
                let settle_key = key.clone();
                // The request leaves the process either way; run it on its
                // own task so it completes and settles the ledger even when
                // every caller drops mid-flight.
                let task = tokio::spawn(async move {
                    let result = inner.execute_mutation(op).await;
                    inner.state.lock().await.ledger.settle(&settle_key);
                    result
                });
                let fut: SharedOutcome = async move {
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => Err(CartError::Api(format!("cart operation failed: {e}"))),
                    }
                }
                .boxed()
                .shared();
                st.ledger.insert(key, fut.clone());
                fut
            }
        };
        outcome.await
    }

    async fn execute_mutation<F, Fut>(&self, op: F) -> Result<Cart, CartError>
    where
        F: FnOnce(Arc<dyn CartApi>, Identity) -> Fut + Send,
        Fut: Future<Output = Result<Option<Cart>, ApiFailure>> + Send,
    {
        let identity = {
            let st = self.state.lock().await;
            st.identity.clone()
        };
        let guard = InFlightGuard::begin(&self.mutations_in_flight);

        let response = op(Arc::clone(&self.api), identity.clone()).await;
        let outcome = match response {
            Ok(Some(cart)) => Ok(cart),
            // Response omitted the snapshot: fall back to one re-fetch.
            Ok(None) => self.api.fetch_cart(&identity).await.map_err(CartError::from),
            Err(e) => Err(CartError::from(e)),
        };

        if outcome.is_ok() {
            self.state.lock().await.last_fetch = Some(Instant::now());
        }
        drop(guard);

        match outcome {
            Ok(cart) => Ok(self.adopt_snapshot(cart, true).await),
            Err(e) => Err(e),
        }
    }

    async fn handle_auth_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::Authenticated { user } => {
                let (guest_cart, session) = {
                    let mut st = self.state.lock().await;
                    let previous = st.identity.clone();
                    st.identity = Identity::Authenticated {
                        user_id: user.id.clone(),
                    };
                    let session = st
                        .resolver
                        .sessions_mut()
                        .save(SessionRecord::authenticated(&user.id));

                    let guest_cart = if st.last_merged_user.as_deref() == Some(user.id.as_str()) {
                        None
                    } else if let Identity::Guest { .. } = previous {
                        st.last_merged_user = Some(user.id.clone());
                        let candidate = if st.cart.is_empty() {
                            self.read_cached_cart(&previous)
                        } else {
                            Some(st.cart.clone())
                        };
                        candidate.filter(|cart| !cart.is_empty())
                    } else {
                        None
                    };
                    (guest_cart, session)
                };

                self.channel
                    .publish(BroadcastEvent::SessionUpdated { record: session });
                if let Some(cart) = guest_cart {
                    self.merge_guest_cart(&user, &cart).await;
                }
                self.schedule_refresh();
            }
            AuthEvent::Unauthenticated => {
                {
                    let mut st = self.state.lock().await;
                    st.last_merged_user = None;
                    st.resolver.sessions_mut().clear();
                    let session = st.resolver.sessions_mut().get_or_create_guest();
                    st.identity = Identity::Guest {
                        session_id: session.id,
                    };
                }
                self.channel.publish(BroadcastEvent::UserLoggedOut);
                self.adopt_snapshot(Cart::empty(), true).await;
                self.schedule_refresh();
            }
        }
    }

    async fn handle_broadcast(&self, event: BroadcastEvent) {
        match event {
            BroadcastEvent::CartUpdated { cart } => {
                // Local overwrite only: no network call, no re-persist.
                self.adopt_snapshot(cart, false).await;
            }
            BroadcastEvent::SessionUpdated { record } => {
                let mut st = self.state.lock().await;
                if record.kind == SessionKind::Authenticated {
                    // The logging-in context already ran the merge; pre-set
                    // the guard so this context does not transfer again.
                    st.last_merged_user = Some(record.id.clone());
                }
                st.resolver.sessions_mut().adopt(record);
                st.resolver.refresh();
            }
            BroadcastEvent::UserLoggedOut => {
                let mut st = self.state.lock().await;
                st.resolver.force_guest();
            }
        }
    }

    fn schedule_refresh(&self) {
        let weak = self.weak_self.clone();
        self.scheduler
            .schedule(AUTH_REFRESH_KEY, AUTH_REFRESH_DEBOUNCE, move || async move {
                let Some(inner) = weak.upgrade() else { return };
                inner.run_scheduled_refresh().await;
            });
    }

    /// The debounced refresh body. Skipped when a recent fetch already
    /// supplied a fresh snapshot or when init/another operation is in
    /// flight.
    async fn run_scheduled_refresh(&self) {
        let fetch = {
            let st = self.state.lock().await;
            let fresh = st
                .last_fetch
                .is_some_and(|at| at.elapsed() < FRESHNESS_WINDOW);
            let busy = self.fetches_in_flight.load(Ordering::SeqCst) > 0
                || self.mutations_in_flight.load(Ordering::SeqCst) > 0
                || st.init.is_some();
            if fresh || busy {
                debug!("scheduled cart refresh skipped (fresh or busy)");
                None
            } else {
                Some((
                    st.identity.clone(),
                    InFlightGuard::begin(&self.fetches_in_flight),
                ))
            }
        };
        let Some((identity, guard)) = fetch else { return };

        let result = self.api.fetch_cart(&identity).await;
        if result.is_ok() {
            self.state.lock().await.last_fetch = Some(Instant::now());
        }
        drop(guard);
        match result {
            Ok(cart) => {
                self.adopt_snapshot(cart, true).await;
            }
            Err(e) => warn!("scheduled cart refresh failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::LocalBus;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tavolo_protocol::{CartLine, TransferRequest, UserRecord};
    use tempfile::TempDir;
    use tokio::time::advance;

    #[derive(Default)]
    struct StubApi {
        fetches: AtomicU32,
        transfers: AtomicU32,
        guest_cart: Option<Cart>,
    }

    fn one_line_cart() -> Cart {
        let mut cart = Cart {
            items: vec![CartLine {
                id: "l1".into(),
                menu_item_id: "M1".into(),
                quantity: 2,
                size: None,
                addons: Vec::new(),
                special_instructions: None,
                unit_price: 4.0,
                line_total: 0.0,
            }],
            ..Cart::empty()
        };
        cart.recompute_totals();
        cart
    }

    #[async_trait]
    impl CartApi for StubApi {
        async fn fetch_cart(&self, identity: &Identity) -> Result<Cart, ApiFailure> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match (identity, &self.guest_cart) {
                (Identity::Guest { .. }, Some(cart)) => Ok(cart.clone()),
                _ => Ok(Cart::empty()),
            }
        }

        async fn add_item(
            &self,
            _identity: &Identity,
            _item: &NewLineItem,
        ) -> Result<Option<Cart>, ApiFailure> {
            Ok(Some(Cart::empty()))
        }

        async fn update_item(
            &self,
            _identity: &Identity,
            _line_id: &str,
            _quantity: u32,
        ) -> Result<Option<Cart>, ApiFailure> {
            Ok(Some(Cart::empty()))
        }

        async fn remove_item(
            &self,
            _identity: &Identity,
            _line_id: &str,
        ) -> Result<Option<Cart>, ApiFailure> {
            Ok(Some(Cart::empty()))
        }

        async fn clear_cart(&self, _identity: &Identity) -> Result<(), ApiFailure> {
            Ok(())
        }

        async fn transfer_cart(&self, request: &TransferRequest) -> Result<Cart, ApiFailure> {
            self.transfers.fetch_add(1, Ordering::SeqCst);
            assert!(!request.temp_cart_items.is_empty());
            Ok(one_line_cart())
        }
    }

    fn engine_with(api: Arc<StubApi>) -> (TempDir, CartEngine) {
        let dir = TempDir::new().expect("tempdir");
        let storage = StorageDir::new(dir.path());
        let bus = LocalBus::new();
        let engine = CartEngine::new(api, storage, Arc::new(bus.endpoint()));
        (dir, engine)
    }

    async fn settle() {
        // Let listener tasks drain their queues.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn user(id: &str) -> UserRecord {
        UserRecord {
            id: id.into(),
            email: None,
            name: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_authenticated_events_merge_once() {
        let api = Arc::new(StubApi {
            guest_cart: Some(one_line_cart()),
            ..StubApi::default()
        });
        let (_dir, engine) = engine_with(Arc::clone(&api));
        engine.init().await.expect("init");
        assert_eq!(one_line_cart(), engine.get_cart().await);

        let _ = engine.inner.auth_tx.send(AuthEvent::Authenticated { user: user("u1") });
        let _ = engine.inner.auth_tx.send(AuthEvent::Authenticated { user: user("u1") });
        settle().await;

        assert_eq!(1, api.transfers.load(Ordering::SeqCst));
        assert_eq!(
            Identity::Authenticated {
                user_id: "u1".into()
            },
            engine.current_identity().await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn auth_event_burst_collapses_to_one_refresh() {
        let api = Arc::new(StubApi::default());
        let (_dir, engine) = engine_with(Arc::clone(&api));
        engine.init().await.expect("init");
        let after_init = api.fetches.load(Ordering::SeqCst);

        for _ in 0..3 {
            let _ = engine.inner.auth_tx.send(AuthEvent::Authenticated { user: user("u1") });
            settle().await;
            advance(Duration::from_millis(100)).await;
        }

        advance(AUTH_REFRESH_DEBOUNCE + Duration::from_secs(1)).await;
        settle().await;

        assert_eq!(after_init + 1, api.fetches.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_before_init_are_rejected() {
        let (_dir, engine) = engine_with(Arc::new(StubApi::default()));

        let err = engine
            .add_item(NewLineItem::new("M1", 1))
            .await
            .expect_err("not ready");
        assert_eq!(CartError::NotReady, err);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_event_reverts_to_fresh_guest() {
        let api = Arc::new(StubApi::default());
        let (_dir, engine) = engine_with(api);
        engine.init().await.expect("init");
        let before = engine.current_identity().await;

        let _ = engine.inner.auth_tx.send(AuthEvent::Authenticated { user: user("u1") });
        settle().await;
        let _ = engine.inner.auth_tx.send(AuthEvent::Unauthenticated);
        settle().await;

        let after = engine.current_identity().await;
        assert!(!after.is_authenticated());
        assert_ne!(before, after, "logout mints a fresh guest session");
        assert!(engine.get_cart().await.is_empty());
    }
}
