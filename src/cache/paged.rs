use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, Shared, WeakShared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::cache::lru::LruSet;
use crate::cache::pool::BufferPool;
use crate::cache::CacheEvent;
use crate::config::CacheConfig;
use crate::source::{ChangeListener, PageableSource, SourceChange, SourceError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("source")]
    Source(#[from] SourceError),
    #[error("cache is closed")]
    Closed,
}

type FetchFuture = BoxFuture<'static, Result<(), CacheError>>;

/// Outcome of a page fetch, shared between every caller that joined it.
type SharedFetch = Shared<FetchFuture>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

struct CacheState<T> {
    pages: HashMap<usize, Vec<T>>,
    pool: BufferPool<T>,
}

struct Inner<T, S> {
    config: CacheConfig,
    source: S,
    state: RwLock<CacheState<T>>,
    recency: Mutex<LruSet>,
    // holds the fetches weakly: the strong handles live in the waiters, so a
    // fetch abandoned by every caller is dropped instead of keeping `Inner`
    // alive through its own captured reference
    in_flight: Mutex<HashMap<usize, WeakShared<FetchFuture>>>,
    events: broadcast::Sender<CacheEvent<T>>,
    subscription: Mutex<Option<crate::source::SubscriptionId>>,
    closed: AtomicBool,
}

enum Lookup<T> {
    Hit(T),
    OutOfRange,
    Miss(usize),
}

/// Paged LRU cache over a [`PageableSource`].
///
/// Serves random-access reads by logical index while batching the underlying
/// I/O into fixed-size pages. At most `max_pages` pages stay resident; the
/// least recently used page is evicted to make room and its buffer is reused
/// for the next load. Concurrent requests for the same missing page share a
/// single fetch.
///
/// Handles are cheap to clone and share one cache.
pub struct PagedCache<T, S> {
    inner: Arc<Inner<T, S>>,
}

impl<T, S> Clone for PagedCache<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, S> PagedCache<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: PageableSource<T> + 'static,
{
    /// Creates a cache over `source` and registers for its change
    /// notifications, if the source supports any.
    ///
    /// The cache takes ownership of the source; pass an `Arc<S>` to keep
    /// using it from outside. Panics if `config` has a zero page size or
    /// page budget.
    pub fn new(source: S, config: CacheConfig) -> Self {
        assert!(config.page_size > 0, "page_size must be positive");
        assert!(config.max_pages > 0, "max_pages must be positive");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(Inner {
            state: RwLock::new(CacheState {
                pages: HashMap::with_capacity(config.max_pages),
                pool: BufferPool::new(config.page_size),
            }),
            recency: Mutex::new(LruSet::new()),
            in_flight: Mutex::new(HashMap::new()),
            events,
            subscription: Mutex::new(None),
            closed: AtomicBool::new(false),
            config,
            source,
        });

        let weak = Arc::downgrade(&inner);
        let listener: ChangeListener<T> = Arc::new(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.apply_source_change(change);
            }
        });
        *inner.subscription.lock() = inner.source.subscribe(listener);

        Self { inner }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns the element at `index`, loading its page from the source if
    /// necessary.
    ///
    /// `Ok(None)` means the index falls in the gap past the end of a short
    /// final page. Fetch failures are propagated verbatim and are never
    /// cached; the next call retries from scratch.
    pub async fn get(&self, index: usize) -> Result<Option<T>, CacheError> {
        loop {
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(CacheError::Closed);
            }
            match self.inner.lookup(index, true) {
                Lookup::Hit(value) => return Ok(Some(value)),
                Lookup::OutOfRange => return Ok(None),
                // the page may have been evicted again by the time the load
                // resolves, so re-check from the top
                Lookup::Miss(page_no) => Arc::clone(&self.inner).load_page(page_no).await?,
            }
        }
    }

    /// Returns the element at `index` if its page is resident, without any
    /// I/O. A hit still refreshes the page's recency.
    pub fn get_cached(&self, index: usize) -> Option<T> {
        if self.inner.closed.load(Ordering::Acquire) {
            return None;
        }
        match self.inner.lookup(index, true) {
            Lookup::Hit(value) => Some(value),
            Lookup::OutOfRange | Lookup::Miss(_) => None,
        }
    }

    /// Whether `index` can currently be served without I/O. Does not affect
    /// recency.
    pub fn is_cached(&self, index: usize) -> bool {
        let (page_no, offset) = self.inner.config.locate(index);
        let state = self.inner.state.read();
        state
            .pages
            .get(&page_no)
            .is_some_and(|page| offset < page.len())
    }

    /// Whether `value` is present in any resident page.
    ///
    /// Linear scan over everything resident; a convenience, not a hot path.
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        let state = self.inner.state.read();
        state.pages.values().any(|page| page.contains(value))
    }

    /// Total number of elements in the source, `None` if the source cannot
    /// tell.
    pub async fn source_count(&self) -> Result<Option<usize>, CacheError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }
        Ok(self.inner.source.count().await)
    }

    /// Evicts every resident page back to the buffer pool. Idempotent.
    /// Fetches already in flight are unaffected and will install once they
    /// resolve.
    pub fn clear(&self) {
        let mut state = self.inner.state.write();
        let mut recency = self.inner.recency.lock();
        Inner::<T, S>::release_all(&mut state, &mut recency);
    }

    /// Subscribes to the cache's change feed (replace/add/reset).
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent<T>> {
        self.inner.events.subscribe()
    }

    /// Tears the cache down: detaches from the source's change
    /// notifications, drops every resident page and pending fetch handle.
    /// Subsequent operations fail with [`CacheError::Closed`]. Call this
    /// when the source is shared, otherwise dropping the last handle is
    /// enough.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(subscription) = self.inner.subscription.lock().take() {
            self.inner.source.unsubscribe(subscription);
        }
        self.inner.in_flight.lock().clear();
        self.clear();
        tracing::debug!("paged cache closed");
    }
}

impl<T, S> Inner<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: PageableSource<T> + 'static,
{
    fn lookup(&self, index: usize, touch: bool) -> Lookup<T> {
        let (page_no, offset) = self.config.locate(index);
        let state = self.state.read();
        match state.pages.get(&page_no) {
            Some(page) if offset < page.len() => {
                let value = page[offset].clone();
                // touch under the read lock so an eviction cannot interleave
                // and leave a non-resident page in the recency set
                if touch {
                    self.recency.lock().touch(page_no);
                }
                Lookup::Hit(value)
            }
            Some(_) => Lookup::OutOfRange,
            None => Lookup::Miss(page_no),
        }
    }

    /// Resolves a miss for `page_no`, joining an in-flight fetch when one
    /// exists and registering a new shared fetch otherwise.
    async fn load_page(self: Arc<Self>, page_no: usize) -> Result<(), CacheError> {
        let fetch = {
            let mut in_flight = self.in_flight.lock();
            // a concurrent loader may have finished first
            if self.state.read().pages.contains_key(&page_no) {
                return Ok(());
            }
            match in_flight.get(&page_no).and_then(|weak| weak.upgrade()) {
                Some(fetch) => fetch,
                None => {
                    let inner = Arc::clone(&self);
                    let fetch: SharedFetch = async move { inner.fetch_and_install(page_no).await }
                        .boxed()
                        .shared();
                    // a dangling entry means every waiter cancelled; the
                    // fresh fetch replaces it
                    if let Some(weak) = fetch.downgrade() {
                        in_flight.insert(page_no, weak);
                    }
                    fetch
                }
            }
        };
        fetch.await
    }

    /// The single fetch for `page_no`: runs the source I/O without any cache
    /// lock held, then installs the page or returns the buffer to the pool.
    async fn fetch_and_install(self: Arc<Self>, page_no: usize) -> Result<(), CacheError> {
        let mut buffer = {
            let mut state = self.state.write();
            if state.pages.len() >= self.config.max_pages {
                let mut recency = self.recency.lock();
                Self::evict_one(&mut state, &mut recency);
            }
            state.pool.acquire()
        };

        let start_index = page_no * self.config.page_size;
        tracing::debug!(page = page_no, start_index, "fetching page");
        let result = self
            .source
            .read_page(start_index, self.config.page_size, &mut buffer)
            .await;

        let mut in_flight = self.in_flight.lock();
        let mut state = self.state.write();
        in_flight.remove(&page_no);

        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }

        match result {
            Ok(()) => {
                debug_assert!(
                    buffer.len() <= self.config.page_size,
                    "source wrote past the page limit"
                );
                let valid = buffer.len();
                let previous = state.pages.insert(page_no, buffer);
                debug_assert!(previous.is_none(), "page installed twice");

                let mut recency = self.recency.lock();
                recency.touch(page_no);
                // concurrent fetches for other pages may have raced past the
                // pre-fetch eviction; the fresh page is most recent and is
                // never the victim
                while state.pages.len() > self.config.max_pages {
                    Self::evict_one(&mut state, &mut recency);
                }
                debug_assert_eq!(recency.len(), state.pages.len());
                tracing::debug!(page = page_no, valid, "page installed");
                Ok(())
            }
            Err(err) => {
                state.pool.release(buffer);
                tracing::debug!(page = page_no, error = %err, "page fetch failed");
                Err(CacheError::Source(err))
            }
        }
    }

    fn evict_one(state: &mut CacheState<T>, recency: &mut LruSet) {
        if let Some(victim) = recency.pop_least_recent() {
            let buffer = state.pages.remove(&victim);
            debug_assert!(buffer.is_some(), "recency tracked a non-resident page");
            if let Some(buffer) = buffer {
                state.pool.release(buffer);
            }
            tracing::debug!(page = victim, "evicted least recently used page");
        }
    }

    fn release_all(state: &mut CacheState<T>, recency: &mut LruSet) {
        let CacheState { pages, pool } = state;
        for (_, buffer) in pages.drain() {
            pool.release(buffer);
        }
        recency.clear();
    }

    /// Reacts to a source mutation, synchronously on the notifying thread.
    fn apply_source_change(&self, change: SourceChange<T>) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        match change {
            SourceChange::Replaced { index, value } => {
                let (page_no, offset) = self.config.locate(index);
                {
                    let mut state = self.state.write();
                    let Some(page) = state.pages.get_mut(&page_no) else {
                        // no resident copy to correct
                        return;
                    };
                    if offset >= page.len() {
                        return;
                    }
                    page[offset] = value.clone();
                }
                tracing::trace!(index, "patched replaced element in place");
                let _ = self.events.send(CacheEvent::Replaced { index, value });
            }
            SourceChange::Added { index, value } => {
                let (page_no, offset) = self.config.locate(index);
                {
                    let mut state = self.state.write();
                    match state.pages.get_mut(&page_no) {
                        // append contiguous with what is cached
                        Some(page) if offset == page.len() => {
                            page.push(value.clone());
                            tracing::trace!(index, "extended resident page in place");
                        }
                        // anything else cannot be repaired locally
                        Some(_) | None => {
                            let mut recency = self.recency.lock();
                            Self::release_all(&mut state, &mut recency);
                            tracing::debug!(index, "non-contiguous add, cache invalidated");
                        }
                    }
                }
                // forwarded regardless of hit or miss so downstream count
                // bookkeeping stays correct
                let _ = self.events.send(CacheEvent::Added { index, value });
            }
            SourceChange::Invalidated => {
                {
                    let mut state = self.state.write();
                    let mut recency = self.recency.lock();
                    Self::release_all(&mut state, &mut recency);
                }
                tracing::debug!("structural source change, cache invalidated");
                let _ = self.events.send(CacheEvent::Reset);
            }
        }
    }
}
