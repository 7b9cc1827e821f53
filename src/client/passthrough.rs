use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::*;
use serde::{de::DeserializeOwned, Serialize};

use super::{cache_key, CacheClient};
use crate::codec;
use crate::error::{CacheError, CacheResult};
use crate::store::{self, Lookup, NULL_MARKER};

impl CacheClient {
    /// Read-through with null caching.
    ///
    /// A hit is decoded and returned. A null marker answers "does not exist"
    /// without touching the backing store. On a true miss `db_fallback` runs
    /// on the caller's task; its result is cached for `ttl`, or a null marker
    /// is cached for the configured null ttl when it finds nothing.
    ///
    /// No lock is taken, so concurrent misses on one key may each query the
    /// backing store and write equivalent values.
    pub async fn query_with_passthrough<ID, R, F, Fut>(
        &self,
        key_prefix: &str,
        id: ID,
        db_fallback: F,
        ttl: Duration,
    ) -> CacheResult<Option<R>>
    where
        ID: Display,
        R: Serialize + DeserializeOwned,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<R>>>,
    {
        let key = cache_key(key_prefix, &id);

        match store::lookup(self.store.as_ref(), &key).await? {
            Lookup::Value(bytes) => {
                debug!("cache hit: {}", key);
                return codec::decode(&bytes).map(Some).map_err(|e| {
                    error!("corrupt cache entry {}: {}", key, e);
                    e
                });
            }
            Lookup::NullMarker => {
                debug!("null marker hit: {}", key);
                return Ok(None);
            }
            Lookup::Absent => debug!("cache miss: {}", key),
        }

        let loaded = db_fallback(id).await.map_err(CacheError::Backing)?;

        match loaded {
            Some(value) => {
                self.set(&key, &value, ttl).await?;
                Ok(Some(value))
            }
            None => {
                let null_ttl = self.config.null_ttl();
                self.store
                    .set(&key, NULL_MARKER.to_vec(), Some(null_ttl))
                    .await?;
                debug!("{} not found, null marker cached for {:?}", key, null_ttl);
                Ok(None)
            }
        }
    }
}
