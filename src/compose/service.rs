//! Request-keyed get-or-compute over the asset store, compositor and cache.
//!
//! # Flow
//! ```text
//! render(request)
//!     → cache lookup ── hit ──────────────────────────────▶ Rendered { hit }
//!     → join in-flight computation for the key
//!         owner:   load top → load bottom → composite → put → share result
//!         waiters: await the owner's shared result
//!     → Rendered { hit: !computed_here }
//! ```
//!
//! At most one computation per key runs at a time. If the computing request
//! is cancelled, the next waiter takes over initialisation. The last
//! participant to leave removes the in-flight entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::compose::assets::AssetStore;
use crate::compose::cache::CompositeCache;
use crate::compose::compositor;
use crate::compose::error::RenderError;
use crate::compose::key::CacheKey;
use crate::observability::metrics;

/// A validated composite request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub top: String,
    pub bottom: String,
    /// Height share of the top image, `0..=100`.
    pub percent: u8,
}

impl RenderRequest {
    pub fn new(top: impl Into<String>, bottom: impl Into<String>, percent: u8) -> Self {
        Self {
            top: top.into(),
            bottom: bottom.into(),
            percent,
        }
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.top, &self.bottom, self.percent)
    }
}

/// Encoded composite plus whether this request avoided computing it.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub bytes: Bytes,
    pub cache_hit: bool,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    /// Renders that ended in an error, whether computed here or shared.
    pub failures: u64,
}

type Flight = Arc<OnceCell<Result<Bytes, RenderError>>>;
type FlightMap = Mutex<HashMap<CacheKey, Flight>>;

/// Membership in a key's in-flight computation.
struct FlightGuard<'a> {
    map: &'a FlightMap,
    key: CacheKey,
    flight: Flight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        // released before the lock so every participant sees an exact count
        let flight = std::mem::take(&mut self.flight);
        // map + this guard; clones only happen under the lock
        let last = Arc::strong_count(&flight) == 2;
        let current = map.get(&self.key).is_some_and(|f| Arc::ptr_eq(f, &flight));
        if last && current {
            map.remove(&self.key);
        }
        drop(flight);
    }
}

/// Produces composites, serving repeats from the cache.
pub struct CompositeService {
    assets: AssetStore,
    cache: CompositeCache,
    in_flight: FlightMap,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
}

impl CompositeService {
    pub fn new(assets: AssetStore, cache: CompositeCache) -> Self {
        Self {
            assets,
            cache,
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn cache(&self) -> &CompositeCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.len(),
            capacity: self.cache.capacity(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Return the composite for `request`, computing it at most once per key
    /// across concurrent callers.
    pub async fn render(&self, request: &RenderRequest) -> Result<Rendered, RenderError> {
        let key = request.key();
        if let Some(bytes) = self.cache.get(&key) {
            return Ok(self.hit(bytes));
        }

        let guard = self.join_in_flight(key);
        // a flight that finished between the lookup and the join has already
        // populated the cache
        if let Some(bytes) = self.cache.get(&guard.key) {
            return Ok(self.hit(bytes));
        }

        let mut computed = false;
        let result = guard
            .flight
            .get_or_init(|| {
                computed = true;
                self.compute(request, &guard.key)
            })
            .await
            .clone();

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };
        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_lookup("miss");
        } else {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_lookup("coalesced");
        }
        Ok(Rendered {
            bytes,
            cache_hit: !computed,
        })
    }

    fn hit(&self, bytes: Bytes) -> Rendered {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup("hit");
        Rendered {
            bytes,
            cache_hit: true,
        }
    }

    fn join_in_flight(&self, key: CacheKey) -> FlightGuard<'_> {
        let mut map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let flight = map.entry(key.clone()).or_default().clone();
        FlightGuard {
            map: &self.in_flight,
            key,
            flight,
        }
    }

    async fn compute(&self, request: &RenderRequest, key: &CacheKey) -> Result<Bytes, RenderError> {
        let started = Instant::now();
        let assets = self.assets.clone();
        let RenderRequest { top, bottom, percent } = request.clone();

        let result = tokio::task::spawn_blocking(move || -> Result<Bytes, RenderError> {
            let top = assets.load(&top)?;
            let bottom = assets.load(&bottom)?;
            Ok(compositor::composite(&top, &bottom, percent)?)
        })
        .await
        .unwrap_or_else(|e| Err(RenderError::Worker(e.to_string())));

        match &result {
            Ok(bytes) => {
                metrics::record_render(started, bytes.len());
                let stored = self.cache.put(key.clone(), bytes.clone());
                tracing::debug!(
                    key = %key,
                    size = bytes.len(),
                    stored,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Composite rendered"
                );
            }
            Err(e) => metrics::record_render_failure(e.kind()),
        }
        result
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }
}
