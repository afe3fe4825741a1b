use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{ChangeListener, PageableSource, SourceError, SubscriptionId};

/// Behavior knobs for [`SimulatedSource`].
#[derive(Debug, Clone, Copy)]
pub struct SimulatedConfig {
    /// Artificial latency added to every read.
    pub delay: Duration,
    /// Reads in flight beyond this limit fail with [`SourceError::Busy`].
    pub max_concurrent_reads: usize,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            max_concurrent_reads: usize::MAX,
        }
    }
}

/// Wraps another source with artificial latency and a concurrent-read limit,
/// standing in for a slow remote backend in tests and benches.
pub struct SimulatedSource<S> {
    inner: S,
    config: SimulatedConfig,
    active_reads: AtomicUsize,
}

impl<S> SimulatedSource<S> {
    pub fn new(inner: S, config: SimulatedConfig) -> Self {
        Self {
            inner,
            config,
            active_reads: AtomicUsize::new(0),
        }
    }

    fn acquire_read_slot(&self) -> Result<ReadSlot<'_>, SourceError> {
        if self.active_reads.fetch_add(1, Ordering::AcqRel) >= self.config.max_concurrent_reads {
            self.active_reads.fetch_sub(1, Ordering::AcqRel);
            return Err(SourceError::Busy);
        }
        Ok(ReadSlot(&self.active_reads))
    }
}

// releases the slot even when the read future is dropped mid-sleep
struct ReadSlot<'a>(&'a AtomicUsize);

impl Drop for ReadSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[async_trait]
impl<T, S> PageableSource<T> for SimulatedSource<S>
where
    T: Send + Sync + 'static,
    S: PageableSource<T>,
{
    async fn read_page(
        &self,
        start_index: usize,
        limit: usize,
        out: &mut Vec<T>,
    ) -> Result<(), SourceError> {
        let _slot = self.acquire_read_slot()?;
        tokio::time::sleep(self.config.delay).await;
        self.inner.read_page(start_index, limit, out).await
    }

    async fn count(&self) -> Option<usize> {
        tokio::time::sleep(self.config.delay).await;
        self.inner.count().await
    }

    fn subscribe(&self, listener: ChangeListener<T>) -> Option<SubscriptionId> {
        self.inner.subscribe(listener)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.inner.unsubscribe(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[tokio::test(start_paused = true)]
    async fn delays_reads() {
        let source = SimulatedSource::new(
            MemorySource::new((0..100u32).collect()),
            SimulatedConfig {
                delay: Duration::from_millis(200),
                ..Default::default()
            },
        );

        let started = tokio::time::Instant::now();
        let mut out = Vec::new();
        source.read_page(0, 10, &mut out).await.unwrap();
        assert_eq!(out.len(), 10);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_reads_over_the_concurrency_limit() {
        let source = SimulatedSource::new(
            MemorySource::new((0..100u32).collect()),
            SimulatedConfig {
                delay: Duration::from_millis(50),
                max_concurrent_reads: 1,
            },
        );

        let mut first = Vec::new();
        let mut second = Vec::new();
        let (a, b) = futures::join!(
            source.read_page(0, 10, &mut first),
            source.read_page(10, 10, &mut second),
        );
        assert_eq!(a, Ok(()));
        assert_eq!(b, Err(SourceError::Busy));

        // the slot frees up once the first read finishes
        let mut third = Vec::new();
        source.read_page(20, 10, &mut third).await.unwrap();
        assert_eq!(third.len(), 10);
    }
}
