//! Identity resolver: derives the effective identity from persisted auth
//! state and the guest session, and emits edge-triggered auth events.

use chrono::Utc;
use tavolo_protocol::{AuthState, Identity, UserRecord};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::session::SessionStore;
use crate::storage::{AUTH_KEY, StorageDir};

/// Emitted exactly once per actual authenticated/unauthenticated
/// transition, not on every check.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    Authenticated { user: UserRecord },
    Unauthenticated,
}

pub struct IdentityResolver {
    storage: StorageDir,
    sessions: SessionStore,
    last_authenticated: Option<bool>,
    tx: broadcast::Sender<AuthEvent>,
}

impl IdentityResolver {
    pub fn new(storage: StorageDir) -> Self {
        let sessions = SessionStore::load(storage.clone());
        let (tx, _) = broadcast::channel(16);
        Self {
            storage,
            sessions,
            last_authenticated: None,
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn sender(&self) -> broadcast::Sender<AuthEvent> {
        self.tx.clone()
    }

    pub fn sessions_mut(&mut self) -> &mut SessionStore {
        &mut self.sessions
    }

    /// The current effective identity.
    ///
    /// Authenticated requires all three: a non-expired token, no guest
    /// flag, and a user record with a non-empty id. Anything else resolves
    /// to a guest identity (minting a fresh session when the persisted one
    /// is missing or expired).
    pub fn current(&mut self) -> Identity {
        if let Some(user) = self.resolve_user() {
            Identity::Authenticated { user_id: user.id }
        } else {
            let session = self.sessions.get_or_create_guest();
            Identity::Guest {
                session_id: session.id,
            }
        }
    }

    pub fn is_authenticated(&mut self) -> bool {
        self.resolve_user().is_some()
    }

    /// Resolve without emitting, seeding transition tracking.
    ///
    /// Used during engine initialization so startup does not replay the
    /// persisted state as a fresh transition.
    pub fn prime(&mut self) -> Identity {
        let identity = self.current();
        self.last_authenticated = Some(identity.is_authenticated());
        identity
    }

    /// Re-derive the identity and emit an event if the authenticated state
    /// actually transitioned since the last resolution.
    pub fn refresh(&mut self) -> Identity {
        let user = self.resolve_user();
        let authenticated = user.is_some();
        let transitioned = self.last_authenticated != Some(authenticated);
        self.last_authenticated = Some(authenticated);

        if transitioned {
            match &user {
                Some(user) => {
                    info!(user_id = %user.id, "identity transitioned to authenticated");
                    let _ = self.tx.send(AuthEvent::Authenticated { user: user.clone() });
                }
                None => {
                    info!("identity transitioned to guest");
                    let _ = self.tx.send(AuthEvent::Unauthenticated);
                }
            }
        }

        match user {
            Some(user) => Identity::Authenticated { user_id: user.id },
            None => {
                let session = self.sessions.get_or_create_guest();
                Identity::Guest {
                    session_id: session.id,
                }
            }
        }
    }

    /// Drop any persisted credentials and revert to guest. Used when a
    /// sibling context broadcasts a logout.
    pub fn force_guest(&mut self) {
        if let Err(e) = self.storage.remove(AUTH_KEY) {
            warn!("failed to clear persisted auth state: {e}");
        }
        self.refresh();
    }

    fn resolve_user(&self) -> Option<UserRecord> {
        let state = self.read_auth();
        let token = state.token.as_ref()?;
        if token.is_expired_at(Utc::now()) || state.guest_mode {
            return None;
        }
        state.user.filter(|u| !u.id.is_empty())
    }

    fn read_auth(&self) -> AuthState {
        match self.storage.read_json::<AuthState>(AUTH_KEY) {
            Ok(Some(state)) => state,
            Ok(None) => AuthState::default(),
            Err(e) => {
                warn!("auth storage unreadable, resolving as guest: {e}");
                AuthState::default()
            }
        }
    }
}
