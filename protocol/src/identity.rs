//! Identity types: who the cart belongs to right now.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The effective identity of a browsing context.
///
/// Exactly one variant is active at any time. The guest-to-authenticated
/// transition happens once per login and triggers the cart merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    Guest { session_id: String },
    Authenticated { user_id: String },
}

impl Identity {
    /// Stable key used to tag persisted cart frames with their owner.
    pub fn cache_key(&self) -> String {
        match self {
            Identity::Guest { session_id } => format!("guest:{session_id}"),
            Identity::Authenticated { user_id } => format!("user:{user_id}"),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated { .. })
    }
}

/// The authenticated user's record as stored by the login flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A credential token with its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Persisted authentication state written by the login flow and read by the
/// identity resolver. Authenticated resolution requires all three: a live
/// token, no guest flag, and a user record with a non-empty id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<AuthToken>,
    #[serde(default)]
    pub guest_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn cache_keys_are_prefixed() {
        let guest = Identity::Guest {
            session_id: "s1".into(),
        };
        let user = Identity::Authenticated {
            user_id: "u1".into(),
        };

        assert_eq!("guest:s1", guest.cache_key());
        assert_eq!("user:u1", user.cache_key());
    }

    #[test]
    fn token_without_expiry_never_expires() {
        let token = AuthToken {
            value: "t".into(),
            expires_at: None,
        };
        assert!(!token.is_expired_at(Utc::now()));
    }

    #[test]
    fn token_expiry_is_inclusive() {
        let now = Utc::now();
        let token = AuthToken {
            value: "t".into(),
            expires_at: Some(now),
        };
        assert!(token.is_expired_at(now));
        assert!(!token.is_expired_at(now - Duration::seconds(1)));
    }
}
