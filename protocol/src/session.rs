//! Persisted session records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retention window after which a session record is considered expired.
pub fn session_max_age() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Guest,
    Authenticated,
}

/// Identity/activity metadata persisted to the storage origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub kind: SessionKind,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionRecord {
    /// A fresh anonymous session with a locally generated id.
    pub fn new_guest() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind: SessionKind::Guest,
            created_at: now,
            last_activity: now,
        }
    }

    /// A marker record for an authenticated user.
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: user_id.into(),
            kind: SessionKind::Authenticated,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_expired(&self, max_age: Duration) -> bool {
        Utc::now() - self.last_activity >= max_age
    }

    /// Stamp the record with fresh activity. Every save goes through this.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_guest_sessions_have_unique_ids() {
        let a = SessionRecord::new_guest();
        let b = SessionRecord::new_guest();

        assert_ne!(a.id, b.id);
        assert_eq!(SessionKind::Guest, a.kind);
    }

    #[test]
    fn expiry_respects_retention_window() {
        let mut record = SessionRecord::new_guest();
        assert!(!record.is_expired(session_max_age()));

        record.last_activity = Utc::now() - Duration::hours(25);
        assert!(record.is_expired(session_max_age()));
    }

    #[test]
    fn touch_advances_last_activity() {
        let mut record = SessionRecord::new_guest();
        record.last_activity = Utc::now() - Duration::hours(1);
        let stale = record.last_activity;

        record.touch();
        assert!(record.last_activity > stale);
    }
}
