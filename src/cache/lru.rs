use std::cmp::Reverse;

use priority_queue::PriorityQueue;

/// Tracks the access order of resident pages.
///
/// Backed by a priority queue keyed on a monotonic access stamp; popping
/// yields the page with the oldest stamp. The cache holds at most a handful
/// of pages so the queue stays tiny.
pub struct LruSet {
    queue: PriorityQueue<usize, Reverse<u64>>,
    stamp: u64,
}

impl LruSet {
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            stamp: 0,
        }
    }

    /// Marks a page most recently used. A page that already is the most
    /// recent entry is left untouched.
    pub fn touch(&mut self, page: usize) {
        if self.most_recent() == Some(page) {
            return;
        }
        self.stamp += 1;
        self.queue.push(page, Reverse(self.stamp));
    }

    /// Removes and returns the least recently used page, if any.
    pub fn pop_least_recent(&mut self) -> Option<usize> {
        self.queue.pop().map(|(page, _)| page)
    }

    #[cfg(test)]
    pub fn least_recent(&self) -> Option<usize> {
        self.queue.peek().map(|(&page, _)| page)
    }

    pub fn most_recent(&self) -> Option<usize> {
        self.queue
            .iter()
            .min_by_key(|&(_, &priority)| priority)
            .map(|(&page, _)| page)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_access_order() {
        let mut lru = LruSet::new();
        lru.touch(0);
        lru.touch(1);
        lru.touch(2);
        assert_eq!(lru.least_recent(), Some(0));
        assert_eq!(lru.most_recent(), Some(2));
        assert_eq!(lru.pop_least_recent(), Some(0));
        assert_eq!(lru.pop_least_recent(), Some(1));
        assert_eq!(lru.pop_least_recent(), Some(2));
        assert_eq!(lru.pop_least_recent(), None);
    }

    #[test]
    fn touch_refreshes_recency() {
        let mut lru = LruSet::new();
        lru.touch(0);
        lru.touch(1);
        lru.touch(2);
        lru.touch(0);
        assert_eq!(lru.least_recent(), Some(1));
        assert_eq!(lru.most_recent(), Some(0));
    }

    #[test]
    fn touching_most_recent_twice_keeps_order() {
        let mut lru = LruSet::new();
        lru.touch(0);
        lru.touch(1);
        lru.touch(1);
        lru.touch(1);
        assert_eq!(lru.least_recent(), Some(0));
        assert_eq!(lru.most_recent(), Some(1));
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn clear_empties_the_set() {
        let mut lru = LruSet::new();
        lru.touch(4);
        lru.touch(7);
        lru.clear();
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.pop_least_recent(), None);
    }
}
