/// single-flight lease stored next to the data it guards
///
/// The lease is the key `<prefix><cache key>` created with set_if_absent and
/// a short ttl. Whoever creates it owns the rebuild; the ttl frees the lease
/// if the owner dies before calling `release`.
use std::sync::Arc;
use std::time::Duration;

use log::*;

use crate::error::CacheResult;
use crate::store::KvStore;

#[derive(Clone)]
pub struct MutexLease {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl MutexLease {
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>) -> MutexLease {
        MutexLease {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn lock_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Claim the lease for `key`. Returns true iff this call created it.
    ///
    /// A false return is the normal outcome under contention.
    pub async fn try_acquire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let lock_key = self.lock_key(key);
        let token = format!("{:016x}", fastrand::u64(..));
        let acquired = self
            .store
            .set_if_absent(&lock_key, token.clone().into_bytes(), ttl)
            .await?;

        if acquired {
            debug!("lease {} acquired, token: {}, ttl: {:?}", lock_key, token, ttl);
        } else {
            debug!("lease {} held elsewhere", lock_key);
        }

        Ok(acquired)
    }

    /// Delete the lease unconditionally.
    pub async fn release(&self, key: &str) -> CacheResult<()> {
        let lock_key = self.lock_key(key);
        self.store.delete(&lock_key).await?;
        debug!("lease {} released", lock_key);

        Ok(())
    }
}

impl std::fmt::Debug for MutexLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutexLease")
            .field("prefix", &self.prefix)
            .finish()
    }
}
