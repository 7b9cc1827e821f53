use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::*;
use serde::{de::DeserializeOwned, Serialize};

use super::{cache_key, CacheClient};
use crate::codec::{self, Envelope};
use crate::error::CacheResult;
use crate::scheduler::RebuildTask;
use crate::store::{self, KvStore, Lookup};

impl CacheClient {
    /// Serve-stale-while-revalidate read for pre-warmed hot keys.
    ///
    /// A missing key returns `None`; nothing is loaded on this path. A fresh
    /// envelope is returned as is. A stale envelope is also returned as is,
    /// but first the caller tries to take the rebuild lease; the winner
    /// queues a rebuild on the scheduler and does not wait for it. Losers
    /// return the stale value without looking again.
    ///
    /// If the rebuild finds the entity gone, the key is deleted rather than
    /// rewritten, so later reads see a miss.
    pub async fn query_with_logical_expiry<ID, R, F, Fut>(
        &self,
        key_prefix: &str,
        id: ID,
        db_fallback: F,
        ttl: Duration,
    ) -> CacheResult<Option<R>>
    where
        ID: Display + Send + 'static,
        R: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(ID) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<R>>> + Send + 'static,
    {
        let key = cache_key(key_prefix, &id);

        let bytes = match store::lookup(self.store.as_ref(), &key).await? {
            Lookup::Value(bytes) => bytes,
            Lookup::Absent | Lookup::NullMarker => {
                debug!("logical expiry miss: {}", key);
                return Ok(None);
            }
        };

        let envelope: Envelope<R> = codec::decode_envelope(&bytes).map_err(|e| {
            error!("corrupt envelope {}: {}", key, e);
            e
        })?;

        if envelope.is_fresh() {
            return Ok(Some(envelope.data));
        }

        if self.lease.try_acquire(&key, self.config.lease_ttl()).await? {
            debug!("{} is stale, scheduling rebuild", key);
            let task = rebuild_task(self.store.clone(), key.clone(), id, db_fallback, ttl)
                .with_lease(self.lease.clone());

            if let Err(e) = self.scheduler.submit(task) {
                error!("could not schedule rebuild of {}: {}", key, e);
                if let Err(e) = self.lease.release(&key).await {
                    error!("failed to release lease for {}: {}", key, e);
                }
            }
        } else {
            debug!("{} is stale, rebuild already in flight", key);
        }

        Ok(Some(envelope.data))
    }
}

// load a fresh value and overwrite the envelope; the task releases the lease
fn rebuild_task<ID, R, F, Fut>(
    store: Arc<dyn KvStore>,
    key: String,
    id: ID,
    db_fallback: F,
    ttl: Duration,
) -> RebuildTask
where
    ID: Display + Send + 'static,
    R: Serialize + Send + 'static,
    F: FnOnce(ID) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<Option<R>>> + Send + 'static,
{
    let task_key = key.clone();

    RebuildTask::new(key, async move {
        match db_fallback(id).await? {
            Some(value) => {
                let bytes = codec::encode_with_expiry(&value, ttl)?;
                store.set(&task_key, bytes, None).await?;
                info!("rebuilt {}, fresh for {:?}", task_key, ttl);
            }
            None => {
                store.delete(&task_key).await?;
                info!("{} is gone from the backing store, entry removed", task_key);
            }
        }

        Ok::<(), anyhow::Error>(())
    })
}
