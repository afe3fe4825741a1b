mod lru;
mod paged;
mod pool;

pub use paged::{CacheError, PagedCache};

/// Change notification emitted by the cache for downstream consumers.
///
/// Mirrors the source-change vocabulary: `Replaced` and `Added` carry the
/// affected index and value, `Reset` means every previously cached index must
/// be considered stale. Events are emitted on whatever thread the source
/// notification arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent<T> {
    Replaced { index: usize, value: T },
    Added { index: usize, value: T },
    Reset,
}
