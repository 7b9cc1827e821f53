//! The cache client: direct writes plus the two read strategies.
//!
//! * [`CacheClient::query_with_passthrough`] caches misses as a null marker so
//!   lookups of ids that do not exist stop reaching the backing store.
//! * [`CacheClient::query_with_logical_expiry`] keeps hot keys in the store
//!   forever and tracks staleness inside the value; a stale read returns the
//!   old value at once and hands the rebuild to the [`RebuildScheduler`],
//!   gated by a [`MutexLease`] so only one rebuild per key is in flight.
//!
//! The client does not own the store or the pool lifecycle beyond
//! [`CacheClient::shutdown`], which drains the rebuild queue.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::*;
use serde::Serialize;

use crate::codec;
use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::lease::MutexLease;
use crate::scheduler::RebuildScheduler;
use crate::store::KvStore;

mod logical;
mod passthrough;

/// `prefix + id`
pub fn cache_key<ID: Display + ?Sized>(prefix: &str, id: &ID) -> String {
    format!("{}{}", prefix, id)
}

#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn KvStore>,
    lease: MutexLease,
    scheduler: Arc<RebuildScheduler>,
    config: CacheConfig,
}

impl CacheClient {
    pub fn new(
        store: Arc<dyn KvStore>,
        scheduler: Arc<RebuildScheduler>,
        config: CacheConfig,
    ) -> CacheClient {
        let lease = MutexLease::new(store.clone(), config.lock_prefix.clone());

        CacheClient {
            store,
            lease,
            scheduler,
            config,
        }
    }

    /// validate the config and start a rebuild pool sized from it
    pub fn from_config(store: Arc<dyn KvStore>, config: CacheConfig) -> Result<CacheClient> {
        config.validate()?;
        let scheduler = Arc::new(RebuildScheduler::new(config.rebuild_pool_size)?);

        Ok(CacheClient::new(store, scheduler, config))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &RebuildScheduler {
        &self.scheduler
    }

    pub fn lease(&self) -> &MutexLease {
        &self.lease
    }

    /// Store `value` under `key`, evicted by the store after `ttl`.
    pub async fn set<R: Serialize>(&self, key: &str, value: &R, ttl: Duration) -> CacheResult<()> {
        let bytes = codec::encode(value)?;
        self.store.set(key, bytes, Some(ttl)).await?;
        debug!("set {} with ttl {:?}", key, ttl);

        Ok(())
    }

    /// Store `value` in an envelope that turns stale after `ttl`.
    /// The key itself never expires; this is how hot keys are pre-warmed.
    pub async fn set_with_logical_expire<R: Serialize>(
        &self,
        key: &str,
        value: &R,
        ttl: Duration,
    ) -> CacheResult<()> {
        let bytes = codec::encode_with_expiry(value, ttl)?;
        self.store.set(key, bytes, None).await?;
        debug!("set {} with logical expiry in {:?}", key, ttl);

        Ok(())
    }

    /// Drop the cached entry, e.g. after the backing row was updated.
    pub async fn invalidate(&self, key: &str) -> CacheResult<()> {
        self.store.delete(key).await?;
        info!("invalidated {}", key);

        Ok(())
    }

    /// Stop the rebuild pool after it has drained its queue.
    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.shutdown().await
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("lease", &self.lease)
            .field("scheduler", &self.scheduler)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::{KeyTtl, MemoryStore};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Shop {
        pub id: u64,
        pub name: String,
    }

    pub fn shop(id: u64, name: &str) -> Shop {
        Shop {
            id,
            name: name.to_string(),
        }
    }

    pub fn client(store: &MemoryStore) -> CacheClient {
        let config = CacheConfig {
            rebuild_pool_size: 2,
            ..Default::default()
        };
        CacheClient::from_config(Arc::new(store.clone()), config).expect("client should start")
    }

    #[test]
    fn key_format() {
        assert_eq!(cache_key("cache:shop:", &17), "cache:shop:17");
        assert_eq!(cache_key("cache:shop:", "types"), "cache:shop:types");
    }

    #[test]
    fn set_and_invalidate() {
        async_std::task::block_on(async move {
            let store = MemoryStore::new();
            let client = client(&store);

            client
                .set("cache:shop:1", &shop(1, "Deli"), Duration::from_secs(60))
                .await
                .unwrap();
            assert!(matches!(
                store.ttl("cache:shop:1").await.unwrap(),
                KeyTtl::Expires(_)
            ));
            let raw = store.get("cache:shop:1").await.unwrap().unwrap();
            assert_eq!(codec::decode::<Shop>(&raw).unwrap(), shop(1, "Deli"));

            client.invalidate("cache:shop:1").await.unwrap();
            assert_eq!(store.get("cache:shop:1").await.unwrap(), None);

            client.shutdown().await.unwrap();
            store.shutdown().await;
        });
    }

    #[test]
    fn logical_expire_is_persistent() {
        async_std::task::block_on(async move {
            let store = MemoryStore::new();
            let client = client(&store);

            client
                .set_with_logical_expire("cache:shop:2", &shop(2, "Bar"), Duration::from_secs(60))
                .await
                .unwrap();
            assert_eq!(store.ttl("cache:shop:2").await.unwrap(), KeyTtl::Persistent);

            let raw = store.get("cache:shop:2").await.unwrap().unwrap();
            let envelope = codec::decode_envelope::<Shop>(&raw).unwrap();
            assert!(envelope.is_fresh());
            assert_eq!(envelope.data, shop(2, "Bar"));

            client.shutdown().await.unwrap();
            store.shutdown().await;
        });
    }

    #[test]
    fn rejects_invalid_config() {
        async_std::task::block_on(async move {
            let store = MemoryStore::new();
            let config = CacheConfig {
                rebuild_pool_size: 0,
                ..Default::default()
            };
            assert!(CacheClient::from_config(Arc::new(store.clone()), config).is_err());
            store.shutdown().await;
        });
    }
}
