//! Value and envelope encoding.
//!
//! Values are stored as JSON. Entries used with logical expiry are wrapped
//! in an [`Envelope`] that carries its own `expireTime`, so the store never
//! evicts them; staleness is decided by the reader. Unknown envelope fields
//! are ignored, so entries written by a newer process still decode.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<R> {
    pub data: R,
    pub expire_time: DateTime<Utc>,
}

impl<R> Envelope<R> {
    /// wrap `data` so that it turns stale `ttl` from now
    pub fn new(data: R, ttl: Duration) -> CacheResult<Envelope<R>> {
        Ok(Envelope {
            data,
            expire_time: expire_at(Utc::now(), ttl)?,
        })
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_time > now
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    pub fn into_parts(self) -> (R, DateTime<Utc>) {
        (self.data, self.expire_time)
    }
}

/// `now + ttl`, or `InvalidTtl` if that overflows the calendar
pub fn expire_at(now: DateTime<Utc>, ttl: Duration) -> CacheResult<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(CacheError::InvalidTtl(ttl))
}

pub fn encode<R: Serialize>(value: &R) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(CacheError::Encode)
}

pub fn decode<R: DeserializeOwned>(bytes: &[u8]) -> CacheResult<R> {
    serde_json::from_slice(bytes).map_err(CacheError::Decode)
}

pub fn encode_with_expiry<R: Serialize>(value: &R, ttl: Duration) -> CacheResult<Vec<u8>> {
    let envelope = Envelope::new(value, ttl)?;

    encode(&envelope)
}

pub fn decode_envelope<R: DeserializeOwned>(bytes: &[u8]) -> CacheResult<Envelope<R>> {
    decode(bytes)
}
