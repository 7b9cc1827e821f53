/// error kinds surfaced by the cache strategies
///
use std::time::Duration;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The key-value store could not be reached or rejected the call.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A value could not be serialized for storage.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stored bytes are malformed. Never treated as a miss.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The backing query function failed.
    #[error("backing store error: {0}")]
    Backing(#[source] anyhow::Error),

    /// A ttl too large to be represented as a wall-clock offset.
    #[error("invalid ttl: {0:?}")]
    InvalidTtl(Duration),

    /// The rebuild scheduler has been shut down.
    #[error("rebuild scheduler is closed")]
    SchedulerClosed,
}

impl CacheError {
    pub fn store<E: std::fmt::Display>(op: &str, err: E) -> CacheError {
        CacheError::StoreUnavailable(format!("{}: {}", op, err))
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, CacheError::StoreUnavailable(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, CacheError::Decode(_))
    }

    pub fn is_backing(&self) -> bool {
        matches!(self, CacheError::Backing(_))
    }
}
