//! Process-wide insight cache and generation state.
//!
//! All reads and writes go through [`InsightCache`]. Cached set, generation
//! flags and the single-flight slot live under one lock, so no observer can
//! see `is_generating == true` next to a freshly stored result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Local, Offset, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::store::{KeyValueStore, StoreError};
use super::types::{CachedInsightSet, GenerationState, Insight, InsightSource};

/// Default validity window of a cached set.
pub const CACHE_TTL_HOURS: i64 = 4;

/// Namespace key of the persisted record.
pub const CACHE_KEY: &str = "insights.cache";

/// Time source for staleness decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Local calendar day as `YYYY-MM-DD`.
    fn today(&self) -> String;
}

/// Wall clock; the calendar day follows the host's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> String {
        Local::now().format("%Y-%m-%d").to_string()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_offset(start, Utc.fix())
    }

    /// Days roll over at local midnight for `offset`.
    pub fn with_offset(start: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now: Mutex::new(start), offset }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn today(&self) -> String {
        self.now().with_timezone(&self.offset).format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default)]
    cached: Option<CachedInsightSet>,
    #[serde(default)]
    generation_error: Option<String>,
}

#[derive(Debug, Default)]
struct CacheState {
    cached: Option<CachedInsightSet>,
    generation: GenerationState,
    /// Epoch of the guard owning the single-flight slot.
    active: Option<u64>,
}

/// Owned cache object shared by the coordinator.
pub struct InsightCache {
    state: Mutex<CacheState>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    store: Option<Arc<dyn KeyValueStore>>,
    epochs: AtomicU64,
}

impl InsightCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            clock,
            ttl: Duration::hours(CACHE_TTL_HOURS),
            store: None,
            epochs: AtomicU64::new(0),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Persist every mutation to `store`.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// True when nothing is cached or the cached set is stale.
    pub fn should_regenerate(&self) -> bool {
        let state = self.state.lock();
        match &state.cached {
            None => true,
            Some(set) => set.is_stale(self.clock.now(), &self.clock.today()),
        }
    }

    /// Store a new set stamped now; clears the generation flags.
    pub fn set_insights(&self, insights: Vec<Insight>, source: InsightSource) -> CachedInsightSet {
        let set = CachedInsightSet::new(insights, source, self.clock.now(), self.ttl, self.clock.today());
        let mut state = self.state.lock();
        state.cached = Some(set.clone());
        state.generation = GenerationState::default();
        state.active = None;
        self.persist_locked(&state);
        tracing::debug!(source = source.as_str(), count = set.insights.len(), "insights cached");
        set
    }

    /// Store a fallback set together with the failure that caused it, in
    /// one step. `error` of `None` behaves like [`set_insights`].
    ///
    /// [`set_insights`]: InsightCache::set_insights
    pub fn set_fallback(&self, insights: Vec<Insight>, error: Option<String>) -> CachedInsightSet {
        let set = CachedInsightSet::new(
            insights,
            InsightSource::Fallback,
            self.clock.now(),
            self.ttl,
            self.clock.today(),
        );
        let mut state = self.state.lock();
        state.cached = Some(set.clone());
        state.generation = GenerationState { is_generating: false, generation_error: error };
        state.active = None;
        self.persist_locked(&state);
        tracing::debug!(
            count = set.insights.len(),
            failed = state.generation.generation_error.is_some(),
            "fallback insights cached"
        );
        set
    }

    /// Record a generation failure and free the single-flight slot.
    pub fn set_generation_error(&self, message: impl Into<String>) {
        let mut state = self.state.lock();
        state.generation.generation_error = Some(message.into());
        state.generation.is_generating = false;
        state.active = None;
        self.persist_locked(&state);
    }

    /// Drop the cached set (logout, data reset).
    pub fn clear_insights(&self) {
        let mut state = self.state.lock();
        state.cached = None;
        self.persist_locked(&state);
        tracing::debug!("insight cache cleared");
    }

    /// Claim the single-flight slot. `None` while another generation runs.
    pub fn try_begin_generation(self: &Arc<Self>) -> Option<GenerationGuard> {
        let mut state = self.state.lock();
        if state.generation.is_generating {
            return None;
        }
        let epoch = self.epochs.fetch_add(1, Ordering::SeqCst) + 1;
        state.generation.is_generating = true;
        state.active = Some(epoch);
        Some(GenerationGuard { cache: Arc::clone(self), epoch })
    }

    pub fn snapshot(&self) -> Option<CachedInsightSet> {
        self.state.lock().cached.clone()
    }

    /// Cached insights, empty when nothing is cached.
    pub fn insights(&self) -> Vec<Insight> {
        self.state
            .lock()
            .cached
            .as_ref()
            .map(|set| set.insights.clone())
            .unwrap_or_default()
    }

    pub fn generation_state(&self) -> GenerationState {
        self.state.lock().generation.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.state.lock().generation.is_generating
    }

    /// Reload the persisted record. Returns whether a cached set was found.
    /// `is_generating` always starts false.
    pub fn restore(&self) -> Result<bool, StoreError> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let Some(raw) = store.get(CACHE_KEY)? else {
            return Ok(false);
        };
        let persisted: PersistedState = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            key: CACHE_KEY.to_string(),
            message: e.to_string(),
        })?;

        let mut state = self.state.lock();
        let found = persisted.cached.is_some();
        state.cached = persisted.cached;
        state.generation = GenerationState {
            is_generating: false,
            generation_error: persisted.generation_error,
        };
        state.active = None;
        Ok(found)
    }

    fn release(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.active == Some(epoch) {
            state.active = None;
            state.generation.is_generating = false;
        }
    }

    fn persist_locked(&self, state: &CacheState) {
        let Some(store) = &self.store else {
            return;
        };
        let record = PersistedState {
            cached: state.cached.clone(),
            generation_error: state.generation.generation_error.clone(),
        };
        let result = serde_json::to_string(&record)
            .map_err(|e| StoreError::Corrupt { key: CACHE_KEY.to_string(), message: e.to_string() })
            .and_then(|json| store.set(CACHE_KEY, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist insight cache");
        }
    }
}

/// Holds the single-flight slot. Dropping it frees the slot unless a
/// newer generation already owns it.
#[must_use = "the generation slot is released when the guard drops"]
pub struct GenerationGuard {
    cache: Arc<InsightCache>,
    epoch: u64,
}

impl GenerationGuard {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.cache.release(self.epoch);
    }
}
