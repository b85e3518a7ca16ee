//! `src/cache/lazy_cache.rs`
//! ============================================================================
//! # `LazyCache`: Memoizing Front for a Children Data Source
//!
//! Sits between the tree and an external [`DataSource`]:
//! - memoizes each parent's children until `stale_time` elapses
//! - single-flight: one outstanding fetch per parent, shared by every caller
//! - bounds the total cached item count, evicting oldest `fetched_at` first
//! - records failures per parent and surfaces them as a placeholder item
//!
//! Bookkeeping happens under a short synchronous lock that is never held
//! across an await. A completion whose entry was cleared or superseded while
//! it was in flight is discarded.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use ahash::AHashMap;
use compact_str::CompactString;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    cache::data_source::{DataSource, FetchError},
    config::LazyLoadingConfig,
    model::item::{ChildrenCount, NodeId, TreeItem},
    util::clock::{Clock, SystemClock},
};

/// Cache key: the parent whose children are stored, `None` for the roots.
pub type ParentKey = Option<NodeId>;

type FetchOutcome = Result<Arc<Vec<TreeItem>>, FetchError>;
type InFlight = Shared<BoxFuture<'static, FetchOutcome>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Loading,
    Loaded,
    Error,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    items: Arc<Vec<TreeItem>>,
    fetched_at: Instant,
    state: EntryState,
    error: Option<CompactString>,
    ticket: u64,
}

/// Load state of an item's own children, attached to every returned item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemMeta {
    pub is_loading: bool,
    pub is_loaded: bool,
    pub has_error: bool,
    pub has_loadable_children: bool,
    pub error_message: Option<CompactString>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedItem {
    pub item: TreeItem,
    pub meta: ItemMeta,
}

impl LoadedItem {
    /// Synthetic stand-in for a failed fetch of `parent`'s children.
    fn error_placeholder(parent: Option<&NodeId>, err: &FetchError) -> Self {
        let item = TreeItem::new(
            NodeId::error_placeholder(parent.map(NodeId::as_str)),
            err.message.clone(),
        )
        .disabled(true)
        .with_children_count(ChildrenCount::Known(0));

        Self {
            item,
            meta: ItemMeta {
                has_error: true,
                error_message: Some(err.message.clone()),
                ..ItemMeta::default()
            },
        }
    }

    /// Whether this is the placeholder for a failed fetch of `parent`'s
    /// children. A real child that failed its own fetch does not match.
    #[must_use]
    pub fn is_error_placeholder(&self, parent: Option<&NodeId>) -> bool {
        self.meta.has_error
            && self.item.id == NodeId::error_placeholder(parent.map(NodeId::as_str))
    }
}

/// Counters for monitoring and tests.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    joins: AtomicU64,
    fetches: AtomicU64,
    fetch_errors: AtomicU64,
    evictions: AtomicU64,
    total_fetch_time_ns: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_join(&self) {
        self.joins.fetch_add(1, Ordering::Relaxed);
    }

    #[expect(clippy::cast_possible_truncation, reason = "Expected accuracy")]
    fn record_fetch(&self, duration: Duration, success: bool) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.total_fetch_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        if !success {
            self.fetch_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let fetches = self.fetches.load(Ordering::Relaxed);
        let total_fetch_time_ns = self.total_fetch_time_ns.load(Ordering::Relaxed);

        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            fetches,
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            average_fetch_time: if fetches > 0 {
                Duration::from_nanos(total_fetch_time_ns / fetches)
            } else {
                Duration::ZERO
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub joins: u64,
    pub fetches: u64,
    pub fetch_errors: u64,
    pub evictions: u64,
    pub average_fetch_time: Duration,
}

impl CacheStatsSnapshot {
    #[expect(clippy::cast_precision_loss, reason = "Expected precision loss")]
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.joins;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: AHashMap<ParentKey, CacheEntry>,
    in_flight: AHashMap<ParentKey, (u64, InFlight)>,
    total_items: usize,
    next_ticket: u64,
}

struct Inner {
    source: Arc<dyn DataSource>,
    config: LazyLoadingConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
    stats: CacheStats,
}

/// Cheap to clone; clones share entries and in-flight fetches.
#[derive(Clone)]
pub struct LazyCache {
    inner: Arc<Inner>,
}

impl LazyCache {
    pub fn new(source: Arc<dyn DataSource>, config: LazyLoadingConfig) -> Self {
        Self::with_clock(source, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn DataSource>,
        config: LazyLoadingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                config,
                clock,
                state: Mutex::new(CacheState::default()),
                stats: CacheStats::default(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &LazyLoadingConfig {
        &self.inner.config
    }

    /// Children of `parent`, annotated with each child's own load state.
    ///
    /// Fetch failures come back as a single placeholder item, never as `Err`.
    #[instrument(skip(self))]
    pub async fn get_children(&self, parent: Option<&NodeId>) -> Vec<LoadedItem> {
        if !self.inner.config.enabled {
            return match self.inner.source.get_tree_items(parent).await {
                Ok(items) => self.annotate(&items),
                Err(err) => vec![LoadedItem::error_placeholder(parent, &err)],
            };
        }

        let key: ParentKey = parent.cloned();
        let pending = {
            let mut state = self.inner.state.lock();
            let now = self.inner.clock.now();

            if let Some(entry) = state.entries.get(&key)
                && entry.state == EntryState::Loaded
                && now.duration_since(entry.fetched_at) < self.inner.config.stale_time
            {
                let items = Arc::clone(&entry.items);
                drop(state);
                self.inner.stats.record_hit();
                debug!(
                    marker = "CACHE_OPERATION",
                    operation_type = "cache_hit",
                    item_count = items.len(),
                    "Serving fresh children from cache"
                );
                return self.annotate(&items);
            }

            if let Some((_, fetch)) = state.in_flight.get(&key) {
                self.inner.stats.record_join();
                debug!(
                    marker = "CACHE_OPERATION",
                    operation_type = "in_flight_join",
                    "Attaching to outstanding fetch"
                );
                fetch.clone()
            } else {
                self.inner.stats.record_miss();
                self.start_fetch(&mut state, key)
            }
        };

        match pending.await {
            Ok(items) => self.annotate(&items),
            Err(err) => vec![LoadedItem::error_placeholder(parent, &err)],
        }
    }

    /// Cached child count when present, otherwise the source's estimate.
    #[must_use]
    pub fn get_children_count(&self, item: &TreeItem) -> ChildrenCount {
        let key: ParentKey = Some(item.id.clone());
        let cached = self
            .inner
            .state
            .lock()
            .entries
            .get(&key)
            .filter(|entry| entry.state == EntryState::Loaded)
            .map(|entry| entry.items.len());

        match cached {
            Some(count) => ChildrenCount::Known(count),
            None => self.inner.source.get_children_count(item),
        }
    }

    /// Start a background fetch if `parent` has neither an entry nor a fetch
    /// in flight. Needs a Tokio runtime; returns whether a fetch was started.
    pub fn preload_children(&self, parent: Option<&NodeId>) -> bool {
        if !self.inner.config.enabled {
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                marker = "CACHE_OPERATION",
                operation_type = "preload_without_runtime",
                "Skipping preload outside a Tokio runtime"
            );
            return false;
        };

        let key: ParentKey = parent.cloned();
        let fetch = {
            let mut state = self.inner.state.lock();
            if state.entries.contains_key(&key) || state.in_flight.contains_key(&key) {
                return false;
            }
            self.start_fetch(&mut state, key)
        };

        runtime.spawn(fetch);
        true
    }

    pub fn clear_cache(&self) {
        let mut state = self.inner.state.lock();
        state.entries.clear();
        state.in_flight.clear();
        state.total_items = 0;
        info!(
            marker = "CACHE_OPERATION",
            operation_type = "clear_all",
            "Cache cleared"
        );
    }

    pub fn clear_cache_for_parent(&self, parent: Option<&NodeId>) {
        let key: ParentKey = parent.cloned();
        let mut state = self.inner.state.lock();
        if let Some(entry) = state.entries.remove(&key) {
            state.total_items -= entry.items.len();
        }
        state.in_flight.remove(&key);
        debug!(
            marker = "CACHE_OPERATION",
            operation_type = "clear_parent",
            parent = ?parent,
            "Cleared cache entry"
        );
    }

    #[must_use]
    pub fn entry_state(&self, parent: Option<&NodeId>) -> Option<EntryState> {
        let key: ParentKey = parent.cloned();
        self.inner.state.lock().entries.get(&key).map(|entry| entry.state)
    }

    #[must_use]
    pub fn error_message(&self, parent: Option<&NodeId>) -> Option<CompactString> {
        let key: ParentKey = parent.cloned();
        self.inner
            .state
            .lock()
            .entries
            .get(&key)
            .and_then(|entry| entry.error.clone())
    }

    /// Total items held across all entries.
    #[must_use]
    pub fn total_cached_items(&self) -> usize {
        self.inner.state.lock().total_items
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_cached(&self, parent: Option<&NodeId>) -> bool {
        let key: ParentKey = parent.cloned();
        self.inner.state.lock().entries.contains_key(&key)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Register a new fetch for `key` and return the shared handle.
    fn start_fetch(&self, state: &mut CacheState, key: ParentKey) -> InFlight {
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        let now = self.inner.clock.now();

        let entry = state.entries.entry(key.clone()).or_insert_with(|| CacheEntry {
            items: Arc::new(Vec::new()),
            fetched_at: now,
            state: EntryState::Loading,
            error: None,
            ticket,
        });
        // Stale items are not served while reloading; release their budget.
        state.total_items -= entry.items.len();
        entry.items = Arc::new(Vec::new());
        entry.state = EntryState::Loading;
        entry.error = None;
        entry.ticket = ticket;

        info!(
            marker = "CACHE_OPERATION",
            operation_type = "fetch_start",
            parent = ?key,
            ticket,
            "Fetching children from data source"
        );

        let inner = Arc::clone(&self.inner);
        let fetch_key = key.clone();
        let fetch = async move {
            let started = Instant::now();
            let outcome: FetchOutcome = inner
                .source
                .get_tree_items(fetch_key.as_ref())
                .await
                .map(Arc::new);
            inner
                .stats
                .record_fetch(started.elapsed(), outcome.is_ok());
            inner.complete(&fetch_key, ticket, &outcome);
            outcome
        }
        .boxed()
        .shared();

        state.in_flight.insert(key, (ticket, fetch.clone()));
        fetch
    }

    fn annotate(&self, items: &[TreeItem]) -> Vec<LoadedItem> {
        let state = self.inner.state.lock();
        items
            .iter()
            .map(|item| {
                let key: ParentKey = Some(item.id.clone());
                let entry = state.entries.get(&key);
                let has_loadable_children = item.children.is_empty()
                    && self
                        .inner
                        .source
                        .get_children_count(item)
                        .may_have_children();

                LoadedItem {
                    item: item.clone(),
                    meta: ItemMeta {
                        is_loading: entry.is_some_and(|e| e.state == EntryState::Loading),
                        is_loaded: entry.is_some_and(|e| e.state == EntryState::Loaded),
                        has_error: entry.is_some_and(|e| e.state == EntryState::Error),
                        has_loadable_children,
                        error_message: entry.and_then(|e| e.error.clone()),
                    },
                }
            })
            .collect()
    }
}

impl Inner {
    /// Store a finished fetch, unless its entry was cleared or re-fetched meanwhile.
    fn complete(&self, key: &ParentKey, ticket: u64, outcome: &FetchOutcome) {
        let mut state = self.state.lock();
        if state
            .in_flight
            .get(key)
            .is_some_and(|(current, _)| *current == ticket)
        {
            state.in_flight.remove(key);
        }

        let now = self.clock.now();
        let Some(entry) = state.entries.get_mut(key) else {
            debug!(
                marker = "CACHE_OPERATION",
                operation_type = "stale_completion",
                parent = ?key,
                "Discarding completion for cleared entry"
            );
            return;
        };
        if entry.ticket != ticket {
            debug!(
                marker = "CACHE_OPERATION",
                operation_type = "superseded_completion",
                parent = ?key,
                ticket,
                "Discarding completion for superseded fetch"
            );
            return;
        }

        let previous = entry.items.len();
        entry.fetched_at = now;
        match outcome {
            Ok(items) => {
                entry.items = Arc::clone(items);
                entry.state = EntryState::Loaded;
                entry.error = None;
            }
            Err(err) => {
                error!(
                    marker = "CACHE_OPERATION",
                    operation_type = "fetch_failure",
                    parent = ?key,
                    error = %err,
                    "Data source rejected children fetch"
                );
                entry.items = Arc::new(Vec::new());
                entry.state = EntryState::Error;
                entry.error = Some(err.message.clone());
            }
        }
        let current = entry.items.len();
        state.total_items = state.total_items - previous + current;

        self.evict_over_limit(&mut state, key);
    }

    /// Evict oldest-fetched settled entries until the total fits. The entry
    /// that just completed goes last; its waiters already hold the items.
    fn evict_over_limit(&self, state: &mut CacheState, keep: &ParentKey) {
        while state.total_items > self.config.max_cache_size {
            let victim = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.state != EntryState::Loading)
                .min_by_key(|(key, entry)| (*key == keep, entry.fetched_at))
                .map(|(key, _)| key.clone());

            let Some(victim) = victim else {
                break;
            };
            if let Some(entry) = state.entries.remove(&victim) {
                state.total_items -= entry.items.len();
                self.stats.record_eviction();
                info!(
                    marker = "CACHE_OPERATION",
                    operation_type = "lru_eviction",
                    parent = ?victim,
                    evicted_items = entry.items.len(),
                    total_items = state.total_items,
                    "Evicted least recently fetched entry"
                );
            }
        }
    }
}

impl std::fmt::Debug for LazyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyCache")
            .field("config", &self.inner.config)
            .field("entry_count", &self.entry_count())
            .finish_non_exhaustive()
    }
}
