/// in-process key-value store with per-key ttl
///
/// A single handler task owns the map and serves commands from a channel,
/// so every operation, set_if_absent included, is atomic with respect to
/// the others.
use std::time::{Duration, Instant};

use anyhow::Result;
use async_channel::{bounded, Receiver, Sender};
use async_std::future;
use async_trait::async_trait;
use domain_keys::keys::RouteKey;
use hashbrown::HashMap;
use log::*;
use service_uptime::Uptime;

use super::KvStore;
use crate::error::{CacheError, CacheResult};
use crate::worker::{JsonString, WorkerState, WorkerStatus};

/// remaining lifetime of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    Persistent,
    Expires(Duration),
}

/// how often the handler drops expired keys nobody reads again
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Command {
    Get(String, Sender<Option<Vec<u8>>>),
    Set(String, Vec<u8>, Option<Duration>, Sender<()>),
    SetIfAbsent(String, Vec<u8>, Duration, Sender<bool>),
    Delete(String, Sender<bool>),
    Ttl(String, Sender<KeyTtl>),
    Len(Sender<usize>),
    Status(Sender<JsonString>),
    Shutdown,
}

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Entry {
        Entry {
            value,
            // a ttl past the clock's range never expires
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

// drop the key if it has expired, then return what is left
fn live<'a>(cache: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a Entry> {
    let now = Instant::now();
    if cache.get(key).map_or(false, |e| e.is_expired(now)) {
        cache.remove(key);
    }

    cache.get(key)
}

fn sweep(cache: &mut HashMap<String, Entry>, now: Instant) -> usize {
    let before = cache.len();
    cache.retain(|_, e| !e.is_expired(now));
    before - cache.len()
}

// the handler loop
async fn handler(id: String, rx: Receiver<Command>, sweep_interval: Duration) -> Result<()> {
    let uptime = Uptime::new();
    let mut state = WorkerState::Idle;
    let mut completed = 0u64;
    let mut error_count = 0u64;

    let mut cache: HashMap<String, Entry> = HashMap::new();
    let mut next_sweep = Instant::now().checked_add(sweep_interval);

    loop {
        // wake up for the sweep even when no commands arrive
        let received = match next_sweep {
            Some(at) => {
                let wait = at.saturating_duration_since(Instant::now());
                future::timeout(wait, rx.recv()).await.ok()
            }
            None => Some(rx.recv().await),
        };

        let now = Instant::now();
        if next_sweep.map_or(false, |at| at <= now) {
            let swept = sweep(&mut cache, now);
            if swept > 0 {
                debug!("store id: {} swept {} expired keys", id, swept);
            }
            next_sweep = now.checked_add(sweep_interval);
        }

        let cmd = match received {
            Some(Ok(cmd)) => cmd,
            Some(Err(_)) => break,
            None => continue,
        };

        match cmd {
            Command::Get(key, tx) => {
                trace!("get key: {}", key);
                let value = live(&mut cache, &key).map(|e| e.value.clone());
                error_count += send_response(value, tx).await;
            }
            Command::Set(key, value, ttl, tx) => {
                trace!("set key: {}, ttl: {:?}", key, ttl);
                cache.insert(key, Entry::new(value, ttl));
                error_count += send_response((), tx).await;
            }
            Command::SetIfAbsent(key, value, ttl, tx) => {
                let created = if live(&mut cache, &key).is_some() {
                    false
                } else {
                    cache.insert(key.clone(), Entry::new(value, Some(ttl)));
                    true
                };
                trace!("set_if_absent key: {}, created: {}", key, created);
                error_count += send_response(created, tx).await;
            }
            Command::Delete(key, tx) => {
                trace!("delete key: {}", key);
                let removed = cache.remove(&key).is_some();
                error_count += send_response(removed, tx).await;
            }
            Command::Ttl(key, tx) => {
                let now = Instant::now();
                let ttl = match live(&mut cache, &key) {
                    None => KeyTtl::Missing,
                    Some(Entry {
                        expires_at: None, ..
                    }) => KeyTtl::Persistent,
                    Some(Entry {
                        expires_at: Some(at),
                        ..
                    }) => KeyTtl::Expires(at.saturating_duration_since(now)),
                };
                error_count += send_response(ttl, tx).await;
            }
            Command::Len(tx) => {
                error_count += send_response(cache.len(), tx).await;
            }
            Command::Status(tx) => {
                let status = WorkerStatus::new(
                    id.to_string(),
                    state.clone(),
                    uptime.to_string(),
                    completed,
                    error_count,
                );

                let msg = status.to_json();
                info!("status response: {}", msg);
                error_count += send_response(msg, tx).await;
            }
            Command::Shutdown => {
                state = WorkerState::Shutdown;
                info!("store id: {}, state: {:?}", id, state);
                break;
            }
        }

        completed += 1;
    }

    // refuse new requests; anything already queued is dropped, which closes
    // its responder and fails the caller
    rx.close();
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        warn!("store id: {} dropped {} queued commands on shutdown", id, dropped);
    }

    Ok(())
}

async fn send_response<T>(msg: T, tx: Sender<T>) -> u64 {
    if tx.send(msg).await.is_err() {
        error!("error sending store response, requester has gone away");
        1
    } else {
        0
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    id: String,
    request_tx: Sender<Command>,
}

impl MemoryStore {
    /// create the store and start its handler task
    pub fn new() -> MemoryStore {
        MemoryStore::with_sweep_interval(SWEEP_INTERVAL)
    }

    /// create the store with its own expired-key sweep cadence
    pub fn with_sweep_interval(sweep_interval: Duration) -> MemoryStore {
        let id = RouteKey::create();
        let wid = id.clone();

        info!("starting up memory store, id: {}", id);

        let (request_tx, request_receiver) = bounded(250);

        async_std::task::spawn(async move {
            match handler(id.clone(), request_receiver, sweep_interval).await {
                Ok(()) => info!("store handler exit for id: {}", id),
                Err(e) => error!("store handler exit with error: {:?}", e),
            }
        });

        MemoryStore {
            id: wid,
            request_tx,
        }
    }

    pub fn id(&self) -> String {
        self.id.to_string()
    }

    async fn request<T>(&self, op: &str, make: impl FnOnce(Sender<T>) -> Command) -> CacheResult<T> {
        let (tx, rx) = bounded(1);
        self.request_tx
            .send(make(tx))
            .await
            .map_err(|e| CacheError::store(op, e))?;

        rx.recv().await.map_err(|e| CacheError::store(op, e))
    }

    pub async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        self.request("ttl", |tx| Command::Ttl(key.to_string(), tx))
            .await
    }

    /// number of keys held; expired keys count until read or swept
    pub async fn len(&self) -> CacheResult<usize> {
        self.request("len", Command::Len).await
    }

    pub async fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn status(&self) -> CacheResult<JsonString> {
        self.request("status", Command::Status).await
    }

    /// stop the handler; later operations fail with `StoreUnavailable`
    pub async fn shutdown(&self) {
        if self.request_tx.send(Command::Shutdown).await.is_err() {
            debug!("store id: {} already shut down", self.id);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.request("get", |tx| Command::Get(key.to_string(), tx))
            .await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.request("set", |tx| Command::Set(key.to_string(), value, ttl, tx))
            .await
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<bool> {
        self.request("set_if_absent", |tx| {
            Command::SetIfAbsent(key.to_string(), value, ttl, tx)
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.request("delete", |tx| Command::Delete(key.to_string(), tx))
            .await
            .map(|_| ())
    }
}
