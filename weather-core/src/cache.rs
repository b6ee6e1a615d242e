//! Time-bounded memoization of payloads per location version.
//!
//! Each key owns an async slot. A caller holds the slot's lock for the whole
//! check-and-refresh, so concurrent callers on one key wait for the single
//! refresh in flight instead of issuing their own. Different keys never share
//! a lock beyond the brief slot lookup.
//!
//! Entries live in process memory. A caller that knows of a payload fetched
//! elsewhere (a stored record written by an earlier process) can offer it as
//! a [`Seed`] for a cold or expired key.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::model::{CacheKey, WeatherPayload};

/// Longest lifetime of any entry.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug)]
struct Entry {
    payload: WeatherPayload,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

type Slot = Arc<tokio::sync::Mutex<Option<Entry>>>;

/// A payload known to stay fresh for `remaining`.
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub payload: WeatherPayload,
    pub remaining: Duration,
}

/// Result of [`FreshnessCache::get_or_refresh`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub payload: WeatherPayload,
    refreshed: bool,
}

impl CacheLookup {
    /// `true` when this call ran the refresh, `false` when served from cache.
    pub fn was_refreshed(&self) -> bool {
        self.refreshed
    }
}

#[derive(Debug)]
pub struct FreshnessCache {
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl FreshnessCache {
    /// `ttl` is capped at [`MAX_TTL`].
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ttl.min(MAX_TTL),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the live entry for `key`, or run `refresh` and keep its result
    /// for one TTL. A failed refresh stores nothing and leaves the previous
    /// entry in place.
    pub async fn get_or_refresh<F, Fut, E>(&self, key: CacheKey, refresh: F) -> Result<CacheLookup, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WeatherPayload, E>>,
    {
        self.get_seeded_or_refresh(key, None, refresh).await
    }

    /// Like [`get_or_refresh`](Self::get_or_refresh), but a missing or expired
    /// entry is first replaced by `seed` when one with time left is given. A
    /// seeded entry expires after its remaining time, never after more than
    /// one TTL, and counts as served from cache.
    pub async fn get_seeded_or_refresh<F, Fut, E>(
        &self,
        key: CacheKey,
        seed: Option<Seed>,
        refresh: F,
    ) -> Result<CacheLookup, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WeatherPayload, E>>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        if let Some(live) = entry.as_ref().filter(|e| e.is_live(Instant::now())) {
            tracing::debug!(%key, "weather served from cache");
            return Ok(CacheLookup {
                payload: live.payload.clone(),
                refreshed: false,
            });
        }

        let (payload, refreshed, lifetime) = match seed.filter(|s| !s.remaining.is_zero()) {
            Some(seed) => {
                tracing::debug!(%key, remaining_secs = seed.remaining.as_secs(), "cache seeded from stored payload");
                (seed.payload, false, seed.remaining.min(self.ttl))
            }
            None => {
                tracing::debug!(%key, "cache entry missing or expired");
                (refresh().await?, true, self.ttl)
            }
        };

        *entry = Some(Entry {
            payload: payload.clone(),
            expires_at: Instant::now() + lifetime,
        });
        drop(entry);

        self.prune();

        Ok(CacheLookup { payload, refreshed })
    }

    fn slot(&self, key: CacheKey) -> Slot {
        self.slots.lock().entry(key).or_default().clone()
    }

    /// Drop idle slots whose entry has expired.
    fn prune(&self) {
        let now = Instant::now();
        self.slots.lock().retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(entry) => entry.as_ref().is_some_and(|e| e.is_live(now)),
                Err(_) => true,
            }
        });
    }
}
