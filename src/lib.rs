#![doc = include_str!("../README.md")]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod lease;
pub mod logging;
pub mod scheduler;
pub mod store;
pub mod worker;

pub use client::{cache_key, CacheClient};
pub use codec::Envelope;
pub use config::{CacheConfig, ConfigError};
pub use error::{CacheError, CacheResult};
pub use lease::MutexLease;
pub use scheduler::{RebuildScheduler, RebuildTask};
pub use store::{KeyTtl, KvStore, Lookup, MemoryStore, NULL_MARKER};

/// the current app version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
