//! Key-value store seam.
//!
//! The cache strategies talk to the remote store only through [`KvStore`],
//! a narrow four-operation interface: point read, write with optional ttl,
//! atomic create-if-missing with ttl, and idempotent delete. Any store that
//! offers those atomically (Redis `GET`/`SET EX`/`SET NX EX`/`DEL`, for
//! example) can back the cache. [`MemoryStore`] is the in-process
//! implementation used for tests and single-node deployments.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheResult;

pub mod memory;

pub use memory::{KeyTtl, MemoryStore};

/// The value written under a key to record "looked up, confirmed absent".
pub const NULL_MARKER: &[u8] = b"";

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Point read with no side effects.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Unconditional write. `None` means the key never expires.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Create the key only if it is missing. Returns true iff this call created it.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<bool>;

    /// Idempotent removal.
    async fn delete(&self, key: &str) -> CacheResult<()>;
}

/// What a read found under a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Never looked up, or expired.
    Absent,
    /// A previous lookup confirmed the entity does not exist.
    NullMarker,
    Value(Vec<u8>),
}

impl From<Option<Vec<u8>>> for Lookup {
    fn from(raw: Option<Vec<u8>>) -> Self {
        match raw {
            None => Lookup::Absent,
            Some(bytes) if bytes.as_slice() == NULL_MARKER => Lookup::NullMarker,
            Some(bytes) => Lookup::Value(bytes),
        }
    }
}

/// read `key` and classify the result
pub async fn lookup(store: &dyn KvStore, key: &str) -> CacheResult<Lookup> {
    let raw = store.get(key).await?;

    Ok(Lookup::from(raw))
}
