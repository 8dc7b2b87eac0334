//! Persisted session store.
//!
//! Keeps an in-memory copy of the session record alongside the persisted
//! one, so a context keeps its identity even when storage is unavailable
//! (quota, permissions). Every save stamps `last_activity`.

use chrono::Duration;
use tavolo_protocol::{SessionRecord, session_max_age};
use tracing::warn;

use crate::storage::{SESSION_KEY, StorageDir};

#[derive(Debug)]
pub struct SessionStore {
    storage: StorageDir,
    current: Option<SessionRecord>,
    max_age: Duration,
}

impl SessionStore {
    /// Load the persisted session, filtering out expired records.
    pub fn load(storage: StorageDir) -> Self {
        let current = match storage.read_json::<SessionRecord>(SESSION_KEY) {
            Ok(record) => record.filter(|r| !r.is_expired(session_max_age())),
            Err(e) => {
                warn!("session storage unavailable, continuing ephemeral: {e}");
                None
            }
        };
        Self {
            storage,
            current,
            max_age: session_max_age(),
        }
    }

    pub fn get(&self) -> Option<&SessionRecord> {
        self.current.as_ref()
    }

    pub fn is_expired(&self) -> bool {
        match &self.current {
            Some(record) => record.is_expired(self.max_age),
            None => true,
        }
    }

    /// Stamp activity and persist. Storage failure degrades to a warning;
    /// the in-memory copy always reflects the save.
    pub fn save(&mut self, mut record: SessionRecord) -> SessionRecord {
        record.touch();
        if let Err(e) = self.storage.write_json(SESSION_KEY, &record) {
            warn!("failed to persist session, continuing ephemeral: {e}");
        }
        self.current = Some(record.clone());
        record
    }

    pub fn clear(&mut self) {
        if let Err(e) = self.storage.remove(SESSION_KEY) {
            warn!("failed to clear persisted session: {e}");
        }
        self.current = None;
    }

    /// Adopt a record observed from another context without re-persisting.
    pub fn adopt(&mut self, record: SessionRecord) {
        self.current = Some(record);
    }

    /// The current guest session, minting a fresh one when missing,
    /// expired, or previously authenticated.
    pub fn get_or_create_guest(&mut self) -> SessionRecord {
        let reusable = self.current.as_ref().is_some_and(|r| {
            r.kind == tavolo_protocol::SessionKind::Guest && !r.is_expired(self.max_age)
        });
        if reusable {
            let record = self.current.clone().unwrap_or_else(SessionRecord::new_guest);
            self.save(record)
        } else {
            self.save(SessionRecord::new_guest())
        }
    }
}
