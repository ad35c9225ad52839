//! Persistence for watershed index runs.
//!
//! Results and score history are JSON documents under fixed keys. They are
//! written to two tiers: a fast local tier and a durable remote object
//! store. [`DurableCache`] reads the fast tier first, falls back to the
//! durable tier (warming the fast one), and always writes both, so either
//! tier alone can warm a cold process.
//!
//! [`RunLease`] guards against two batch runs overlapping. Leases expire,
//! so a crashed run cannot block the next one forever.

mod cache;
mod error;
mod http;
mod local;
mod lock;
mod memory;

pub use cache::{DurableCache, HISTORY_KEY, INDICES_KEY};
pub use error::{LeaseError, Result, StoreError};
pub use http::HttpObjectStore;
pub use local::LocalFileStore;
pub use lock::{LeaseGuard, LeaseRecord, RunLease};
pub use memory::MemoryStore;

use std::future::Future;

/// A flat key → bytes store.
///
/// Keys are `/`-separated relative paths such as `wci/indices.json`.
pub trait ObjectStore: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Fetch an object. `Ok(None)` when the key does not exist.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Create or replace an object.
    fn put(&self, key: &str, body: Vec<u8>) -> impl Future<Output = Result<()>> + Send;
}

/// Reject keys that are empty, absolute or climb out of the store root.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_relative_keys() {
        assert!(validate_key("wci/indices.json").is_ok());
        assert!(validate_key("history.json").is_ok());
    }

    #[test]
    fn rejects_escaping_keys() {
        for key in ["", "/etc/passwd", "../x", "wci/../../x", "wci//x", "a\\b", "./x"] {
            assert!(
                matches!(validate_key(key), Err(StoreError::InvalidKey(_))),
                "{:?} should be rejected",
                key
            );
        }
    }
}
