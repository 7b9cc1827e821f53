//! Rebuild scheduler: a fixed pool of workers draining one shared queue.
//!
//! `submit` never runs work on the caller's task; it only enqueues. The queue
//! is unbounded, which is acceptable because every rebuild is gated by a
//! lease, so there is at most one queued or running task per cache key.
//!
//! The pool is owned by whoever creates it. `shutdown` stops intake, lets the
//! workers finish everything already queued, and waits for them to exit.

use std::sync::Mutex;

use anyhow::Result;
use async_channel::{unbounded, Sender};
use async_std::task::JoinHandle;
use log::*;

use crate::error::{CacheError, CacheResult};
use crate::worker::WorkerStatus;

pub mod task;
pub mod worker;

pub use task::{RebuildTask, TaskOutcome};
pub use worker::Worker;

#[derive(Debug)]
pub struct RebuildScheduler {
    pub pool_size: usize,
    pub workers: Vec<Worker>,
    task_tx: Sender<RebuildTask>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl RebuildScheduler {
    /// start `pool_size` workers
    pub fn new(pool_size: usize) -> Result<RebuildScheduler> {
        anyhow::ensure!(pool_size > 0, "rebuild pool size must be at least 1");

        let (task_tx, task_rx) = unbounded();

        let mut workers = Vec::with_capacity(pool_size);
        let mut handles = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let (worker, handle) = Worker::start(task_rx.clone());
            workers.push(worker);
            handles.push(handle);
        }

        info!("rebuild scheduler started with {} workers", pool_size);

        Ok(RebuildScheduler {
            pool_size,
            workers,
            task_tx,
            handles: Mutex::new(handles),
        })
    }

    /// Enqueue a task and return immediately.
    pub fn submit(&self, task: RebuildTask) -> CacheResult<()> {
        self.task_tx.try_send(task).map_err(|e| {
            warn!("rebuild of {} rejected, scheduler is closed", e.into_inner().key());
            CacheError::SchedulerClosed
        })
    }

    /// tasks waiting for a free worker
    pub fn pending(&self) -> usize {
        self.task_tx.len()
    }

    pub fn is_closed(&self) -> bool {
        self.task_tx.is_closed()
    }

    pub fn status(&self) -> Vec<WorkerStatus> {
        self.workers.iter().map(|w| w.status()).collect()
    }

    /// Stop accepting tasks, drain the queue, and wait for every worker to exit.
    pub async fn shutdown(&self) -> Result<()> {
        if self.task_tx.close() {
            info!("rebuild scheduler closing, {} tasks left to drain", self.pending());
        }

        let handles = {
            let mut guard = self
                .handles
                .lock()
                .map_err(|_| anyhow::anyhow!("scheduler handle lock poisoned"))?;
            std::mem::take(&mut *guard)
        };

        for handle in handles {
            handle.await;
        }

        Ok(())
    }
}
