use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::Receiver;
use async_std::task::JoinHandle;
use domain_keys::keys::RouteKey;
use log::*;
use service_uptime::Uptime;

use super::task::{RebuildTask, TaskOutcome};
use crate::worker::{WorkerState, WorkerStatus};

#[derive(Debug, Default)]
pub struct WorkerStats {
    busy: AtomicBool,
    stopped: AtomicBool,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl WorkerStats {
    fn state(&self) -> WorkerState {
        if self.stopped.load(Ordering::Acquire) {
            WorkerState::Shutdown
        } else if self.busy.load(Ordering::Acquire) {
            WorkerState::Busy
        } else {
            WorkerState::Idle
        }
    }
}

// the handler loop; competes with the other workers for queued tasks
pub async fn handler(id: String, rx: Receiver<RebuildTask>, stats: Arc<WorkerStats>) {
    while let Ok(task) = rx.recv().await {
        stats.busy.store(true, Ordering::Release);
        debug!("worker {} running rebuild of {}", id, task.key());

        match task.run().await {
            TaskOutcome::Completed => stats.completed.fetch_add(1, Ordering::AcqRel),
            TaskOutcome::Failed | TaskOutcome::Panicked => {
                stats.failed.fetch_add(1, Ordering::AcqRel)
            }
        };

        stats.busy.store(false, Ordering::Release);
    }

    stats.stopped.store(true, Ordering::Release);
    info!("worker id: {}, state: {:?}", id, WorkerState::Shutdown);
}

#[derive(Debug)]
pub struct Worker {
    id: String,
    uptime: Uptime,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// create a worker and start its loop on the shared queue
    pub fn start(rx: Receiver<RebuildTask>) -> (Worker, JoinHandle<()>) {
        let id = RouteKey::create();
        let stats = Arc::new(WorkerStats::default());

        info!("starting up rebuild worker, id: {}", id);

        let handle = async_std::task::spawn(handler(id.clone(), rx, stats.clone()));

        let worker = Worker {
            id,
            uptime: Uptime::new(),
            stats,
        };

        (worker, handle)
    }

    pub fn id(&self) -> String {
        self.id.to_string()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.uptime.get_uptime_seconds()
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus::new(
            self.id(),
            self.stats.state(),
            self.uptime.to_string(),
            self.stats.completed.load(Ordering::Acquire),
            self.stats.failed.load(Ordering::Acquire),
        )
    }
}
