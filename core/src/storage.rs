//! File-per-key persisted store standing in for the browser storage origin.
//!
//! Each well-known key (`session`, `cart`, `auth`, `broadcast`) maps to one
//! JSON file under the storage root. Writes are atomic (temp file + rename)
//! and created with 0o600 on Unix. Callers treat write failures as warnings;
//! the system degrades to "ephemeral, current context only" rather than
//! failing the session.

use std::fs::{self, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tavolo_protocol::Cart;

/// Well-known storage keys shared across browsing contexts.
pub const SESSION_KEY: &str = "session";
pub const CART_KEY: &str = "cart";
pub const AUTH_KEY: &str = "auth";
pub const BROADCAST_KEY: &str = "broadcast";

/// Retention window for a persisted cart frame.
pub fn cart_max_age() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A directory acting as the shared storage origin.
#[derive(Debug, Clone)]
pub struct StorageDir {
    root: PathBuf,
}

impl StorageDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Read and decode a key. A missing file reads as `None`.
    pub fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Encode and write a key atomically.
    pub fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(value)?;

        let tmp = self.root.join(format!(".{key}.json.tmp"));
        {
            let mut open = OpenOptions::new();
            open.write(true).create(true).truncate(true);
            #[cfg(unix)]
            open.mode(0o600);
            let mut file = open.open(&tmp)?;
            file.write_all(json.as_bytes())?;
        }
        fs::rename(&tmp, self.path_for(key))?;
        Ok(())
    }

    /// Remove a key. Missing files are not an error.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Persistence frame for the cart snapshot: the cart, the identity it was
/// fetched for, and when it was saved. Frames older than [`cart_max_age`]
/// or belonging to a different identity read as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedCart {
    pub cart: Cart,
    pub identity_key: String,
    pub saved_at: DateTime<Utc>,
}

impl CachedCart {
    pub fn new(cart: Cart, identity_key: impl Into<String>) -> Self {
        Self {
            cart,
            identity_key: identity_key.into(),
            saved_at: Utc::now(),
        }
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        Utc::now() - self.saved_at >= max_age
    }
}
