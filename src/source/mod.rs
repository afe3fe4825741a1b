mod memory;
mod simulated;

pub use memory::MemorySource;
pub use simulated::{SimulatedConfig, SimulatedSource};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("start index {0} is out of bounds")]
    OutOfBounds(usize),
    #[error("concurrency limit reached")]
    Busy,
    #[error("read cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

/// A change reported by a live data source.
///
/// `Added` carries append-at-tail semantics: `index` is expected to be the new
/// last index of the source. Removals, moves and anything else structural are
/// collapsed into `Invalidated` since the cache cannot repair arbitrary edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChange<T> {
    Replaced { index: usize, value: T },
    Added { index: usize, value: T },
    Invalidated,
}

/// Callback invoked synchronously on whatever thread mutates the source.
pub type ChangeListener<T> = Arc<dyn Fn(SourceChange<T>) + Send + Sync>;

/// Handle returned by [`PageableSource::subscribe`], used to detach again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A data source that can be read in contiguous chunks.
#[async_trait]
pub trait PageableSource<T>: Send + Sync {
    /// Appends up to `limit` elements starting at `start_index` to `out`.
    ///
    /// Writing fewer than `limit` elements is only valid at the end of a
    /// finite source; a `start_index` at or past the end is an
    /// [`SourceError::OutOfBounds`] failure.
    async fn read_page(
        &self,
        start_index: usize,
        limit: usize,
        out: &mut Vec<T>,
    ) -> Result<(), SourceError>;

    /// Number of elements in the source, `None` if it cannot be determined.
    async fn count(&self) -> Option<usize>;

    /// Registers a change listener. Sources without change notifications
    /// keep the default and return `None`.
    fn subscribe(&self, listener: ChangeListener<T>) -> Option<SubscriptionId> {
        let _ = listener;
        None
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        let _ = subscription;
    }
}

#[async_trait]
impl<T, S> PageableSource<T> for Arc<S>
where
    T: Send + Sync + 'static,
    S: PageableSource<T> + ?Sized,
{
    async fn read_page(
        &self,
        start_index: usize,
        limit: usize,
        out: &mut Vec<T>,
    ) -> Result<(), SourceError> {
        self.as_ref().read_page(start_index, limit, out).await
    }

    async fn count(&self) -> Option<usize> {
        self.as_ref().count().await
    }

    fn subscribe(&self, listener: ChangeListener<T>) -> Option<SubscriptionId> {
        self.as_ref().subscribe(listener)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.as_ref().unsubscribe(subscription)
    }
}

/// Listener registry for sources that support change notifications.
pub struct ChangeListeners<T> {
    inner: Mutex<ListenerTable<T>>,
}

struct ListenerTable<T> {
    next_id: u64,
    listeners: HashMap<u64, ChangeListener<T>>,
}

impl<T: Clone> ChangeListeners<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ListenerTable {
                next_id: 0,
                listeners: HashMap::new(),
            }),
        }
    }

    pub fn subscribe(&self, listener: ChangeListener<T>) -> SubscriptionId {
        let mut table = self.inner.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.listeners.insert(id, listener);
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        self.inner.lock().listeners.remove(&subscription.0);
    }

    /// Invokes every registered listener with a copy of `change`.
    ///
    /// The listener list is snapshotted first so a listener may subscribe or
    /// unsubscribe from within its callback.
    pub fn notify(&self, change: SourceChange<T>) {
        let listeners: Vec<ChangeListener<T>> =
            self.inner.lock().listeners.values().cloned().collect();
        for listener in listeners {
            listener(change.clone());
        }
    }
}

impl<T: Clone> Default for ChangeListeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listeners_receive_until_unsubscribed() {
        let listeners: ChangeListeners<u32> = ChangeListeners::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let subscription = listeners.subscribe(Arc::new(move |change| {
            sink.lock().push(change);
        }));

        listeners.notify(SourceChange::Added { index: 0, value: 7 });
        listeners.unsubscribe(subscription);
        listeners.notify(SourceChange::Invalidated);

        assert_eq!(
            seen.lock().as_slice(),
            &[SourceChange::Added { index: 0, value: 7 }]
        );
    }
}
