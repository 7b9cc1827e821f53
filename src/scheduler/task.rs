/// a unit of rebuild work plus the lease it must give back
///
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use log::*;

use crate::lease::MutexLease;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
    Panicked,
}

pub struct RebuildTask {
    key: String,
    work: BoxFuture<'static, anyhow::Result<()>>,
    lease: Option<MutexLease>,
}

impl RebuildTask {
    pub fn new<F>(key: impl Into<String>, work: F) -> RebuildTask
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        RebuildTask {
            key: key.into(),
            work: work.boxed(),
            lease: None,
        }
    }

    /// release the lease for this task's key once the work ends, whatever the outcome
    pub fn with_lease(mut self, lease: MutexLease) -> RebuildTask {
        self.lease = Some(lease);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run the work, log any failure or panic, then release the lease.
    pub async fn run(self) -> TaskOutcome {
        let RebuildTask { key, work, lease } = self;

        let outcome = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(())) => {
                debug!("rebuild of {} completed", key);
                TaskOutcome::Completed
            }
            Ok(Err(e)) => {
                error!("rebuild of {} failed: {:#}", key, e);
                TaskOutcome::Failed
            }
            Err(_) => {
                error!("rebuild of {} panicked", key);
                TaskOutcome::Panicked
            }
        };

        if let Some(lease) = lease {
            if let Err(e) = lease.release(&key).await {
                // the lease ttl will free it
                error!("failed to release lease for {}: {}", key, e);
            }
        }

        outcome
    }
}

impl std::fmt::Debug for RebuildTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildTask")
            .field("key", &self.key)
            .field("lease", &self.lease)
            .finish()
    }
}
