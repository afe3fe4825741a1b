pub const DEFAULT_PAGE_SIZE: usize = 128;
pub const DEFAULT_MAX_PAGES: usize = 8;

/// Cache sizing, fixed for the cache's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Number of elements per page.
    pub page_size: usize,
    /// Number of resident pages before eviction kicks in.
    pub max_pages: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl CacheConfig {
    /// Maps a logical index to its page number and offset within that page.
    pub(crate) fn locate(&self, index: usize) -> (usize, usize) {
        (index / self.page_size, index % self.page_size)
    }
}
