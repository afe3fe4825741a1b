//! Paged LRU cache for index-addressed data sources.
//!
//! [`PagedCache`] sits between a consumer that wants random-access reads by
//! logical index and a [`PageableSource`] that is only efficient to read in
//! contiguous fixed-size chunks. Reads are batched into pages, a bounded
//! number of pages stays resident (the least recently used page is evicted
//! first), freed page buffers are reused, and concurrent requests for the
//! same missing page coalesce into a single fetch.
//!
//! Sources that mutate live can notify the cache, which patches resident
//! pages in place where possible and falls back to full invalidation
//! otherwise, forwarding [`CacheEvent`]s to downstream consumers.

pub mod cache;
pub mod config;
pub mod source;

pub use cache::{CacheError, CacheEvent, PagedCache};
pub use config::CacheConfig;
pub use source::{
    ChangeListener, ChangeListeners, MemorySource, PageableSource, SimulatedConfig,
    SimulatedSource, SourceChange, SourceError, SubscriptionId,
};
