use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    ChangeListener, ChangeListeners, PageableSource, SourceChange, SourceError, SubscriptionId,
};

/// In-memory [`PageableSource`] over a vector.
///
/// The mutation methods notify subscribed listeners, which makes this source
/// double as the reference implementation of the change-notification
/// contract.
pub struct MemorySource<T> {
    items: Mutex<Vec<T>>,
    listeners: ChangeListeners<T>,
}

impl<T> MemorySource<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Mutex::new(items),
            listeners: ChangeListeners::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.items.lock().get(index).cloned()
    }

    /// Overwrites the element at `index` and notifies listeners.
    ///
    /// Panics if `index` is out of bounds.
    pub fn replace(&self, index: usize, value: T) {
        {
            let mut items = self.items.lock();
            items[index] = value.clone();
        }
        self.listeners.notify(SourceChange::Replaced { index, value });
    }

    /// Appends an element and notifies listeners.
    pub fn push(&self, value: T) {
        let index = {
            let mut items = self.items.lock();
            items.push(value.clone());
            items.len() - 1
        };
        self.listeners.notify(SourceChange::Added { index, value });
    }

    /// Removes the element at `index`, reported to listeners as a structural
    /// invalidation.
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove(&self, index: usize) -> T {
        let value = self.items.lock().remove(index);
        self.listeners.notify(SourceChange::Invalidated);
        value
    }
}

#[async_trait]
impl<T> PageableSource<T> for MemorySource<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn read_page(
        &self,
        start_index: usize,
        limit: usize,
        out: &mut Vec<T>,
    ) -> Result<(), SourceError> {
        let items = self.items.lock();
        if start_index >= items.len() {
            return Err(SourceError::OutOfBounds(start_index));
        }
        let end = items.len().min(start_index.saturating_add(limit));
        out.extend_from_slice(&items[start_index..end]);
        Ok(())
    }

    async fn count(&self) -> Option<usize> {
        Some(self.items.lock().len())
    }

    fn subscribe(&self, listener: ChangeListener<T>) -> Option<SubscriptionId> {
        Some(self.listeners.subscribe(listener))
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.listeners.unsubscribe(subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_full_and_short_pages() {
        let source = MemorySource::new((0..10u32).collect());

        let mut out = Vec::with_capacity(4);
        source.read_page(0, 4, &mut out).await.unwrap();
        assert_eq!(out, [0, 1, 2, 3]);

        // short read at the tail
        out.clear();
        source.read_page(8, 4, &mut out).await.unwrap();
        assert_eq!(out, [8, 9]);

        assert_eq!(source.count().await, Some(10));
    }

    #[tokio::test]
    async fn read_past_the_end_fails() {
        let source = MemorySource::new(vec![1u32, 2, 3]);
        let mut out = Vec::new();
        assert_eq!(
            source.read_page(3, 4, &mut out).await,
            Err(SourceError::OutOfBounds(3))
        );
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn mutations_notify_listeners() {
        use std::sync::Arc;

        let source = MemorySource::new(vec![10u32, 20, 30]);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let subscription = source
            .subscribe(Arc::new(move |change| sink.lock().push(change)))
            .unwrap();

        source.replace(1, 21);
        source.push(40);
        source.remove(0);

        assert_eq!(
            seen.lock().as_slice(),
            &[
                SourceChange::Replaced { index: 1, value: 21 },
                SourceChange::Added { index: 3, value: 40 },
                SourceChange::Invalidated,
            ]
        );

        source.unsubscribe(subscription);
        source.push(50);
        assert_eq!(seen.lock().len(), 3);
    }
}
