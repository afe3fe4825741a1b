/// Free list of page buffers.
///
/// Buffers are `Vec<T>`s with capacity `page_size`; a buffer's length is the
/// number of valid elements in the page it backs. Evicted buffers come back
/// here so loading a new page does not reallocate.
pub struct BufferPool<T> {
    free: Vec<Vec<T>>,
    page_size: usize,
}

impl<T> BufferPool<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            free: Vec::new(),
            page_size,
        }
    }

    /// Returns a previously released buffer or allocates a fresh one.
    pub fn acquire(&mut self) -> Vec<T> {
        self.free
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.page_size))
    }

    /// Takes a buffer back for reuse, dropping its contents.
    pub fn release(&mut self, mut buffer: Vec<T>) {
        buffer.clear();
        debug_assert!(buffer.capacity() >= self.page_size);
        self.free.push(buffer);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_allocates_to_page_size() {
        let mut pool: BufferPool<u32> = BufferPool::new(16);
        let buffer = pool.acquire();
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= 16);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn release_recycles_cleared_buffers() {
        let mut pool: BufferPool<u32> = BufferPool::new(4);
        let mut buffer = pool.acquire();
        buffer.extend([1, 2, 3]);
        pool.release(buffer);
        assert_eq!(pool.len(), 1);

        let reused = pool.acquire();
        assert!(reused.is_empty());
        assert!(reused.capacity() >= 4);
        assert_eq!(pool.len(), 0);
    }
}
