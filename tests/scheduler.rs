/// integration tests to ensure the rebuild pool runs, drains and reports its workers
///
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cache_shield::scheduler::{RebuildScheduler, RebuildTask};
use cache_shield::worker::{WorkerState, DOWN, OK};

#[test]
fn single_worker() {
    async_std::task::block_on(async move {
        let scheduler = RebuildScheduler::new(1).expect("should create the scheduler");

        assert_eq!(scheduler.pool_size, 1);
        assert_eq!(scheduler.workers.len(), 1);

        let status = scheduler.status();
        println!("{:?}", status);
        assert_eq!(status.len(), 1);
        for sts in status.iter() {
            assert_eq!(sts.worker_id.len(), 16);
            assert_eq!(sts.status, OK);
            assert_eq!(sts.state, WorkerState::Idle);
            assert!(sts.uptime.starts_with("0 days, 00:00"));
            assert_eq!(sts.error_count, 0);
        }

        assert!(scheduler.shutdown().await.is_ok());
        for sts in scheduler.status() {
            assert_eq!(sts.status, DOWN);
            assert_eq!(sts.state, WorkerState::Shutdown);
        }
    });
}

#[test]
fn submit_does_not_run_on_caller() {
    async_std::task::block_on(async move {
        let scheduler = RebuildScheduler::new(2).unwrap();
        let (gate_tx, gate_rx) = async_channel::bounded::<()>(1);
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = ran.clone();
        scheduler
            .submit(RebuildTask::new("gated", async move {
                let _ = gate_rx.recv().await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();

        // submit returned while the task is still parked on the gate
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        gate_tx.send(()).await.unwrap();
        scheduler.shutdown().await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn worker_pool() {
    async_std::task::block_on(async move {
        let scheduler = RebuildScheduler::new(4).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        for n in 0..50 {
            let counter = ran.clone();
            scheduler
                .submit(RebuildTask::new(format!("cache:shop:{}", n), async move {
                    async_std::task::sleep(Duration::from_millis(2)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    if n % 10 == 0 {
                        anyhow::bail!("row {} locked", n);
                    }
                    Ok(())
                }))
                .unwrap();
        }

        // shutdown drains everything already queued
        scheduler.shutdown().await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 50);
        assert_eq!(scheduler.pending(), 0);

        let status = scheduler.status();
        let completed: u64 = status.iter().map(|s| s.completed).sum();
        let failed: u64 = status.iter().map(|s| s.error_count).sum();
        assert_eq!(completed, 45);
        assert_eq!(failed, 5);
    });
}
