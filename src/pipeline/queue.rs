//! Bounded, thread-safe FIFO of detected keywords.
//!
//! The capture thread is the only producer; any number of consumer threads
//! may drain the queue concurrently.  A single mutex guards the items, the
//! capacity and the overflow counter together so the capacity check and the
//! append in [`KeywordQueue::push`] happen as one step.
//!
//! # Overflow behaviour
//!
//! Unlike the audio [`RingBuffer`](crate::audio::RingBuffer), a full queue
//! never evicts old entries.  `push` returns `false` and the caller decides
//! what to do (the runner logs a warning and keeps listening).
//!
//! ```rust
//! use kws_runner::pipeline::KeywordQueue;
//!
//! let queue = KeywordQueue::with_capacity(2);
//! assert!(queue.push("alpha"));
//! assert!(queue.push("beta"));
//! assert!(!queue.push("gamma"));
//!
//! assert_eq!(queue.pop_front().as_deref(), Some("alpha"));
//! assert_eq!(queue.rejected(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Capacity used by [`KeywordQueue::new`].
pub const DEFAULT_CAPACITY: usize = 100;

/// Thread-safe handle to a [`KeywordQueue`].
pub type SharedQueue = Arc<KeywordQueue>;

struct Inner {
    items: VecDeque<String>,
    capacity: usize,
    /// Pushes refused because the queue was full.
    rejected: u64,
}

/// Bounded FIFO of keyword strings.
pub struct KeywordQueue {
    inner: Mutex<Inner>,
}

impl KeywordQueue {
    /// Create an empty queue with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty queue holding at most `capacity` keywords.
    ///
    /// A zero capacity is replaced by [`DEFAULT_CAPACITY`] with a warning.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            log::warn!("keyword queue capacity must be > 0, using {DEFAULT_CAPACITY}");
            DEFAULT_CAPACITY
        } else {
            capacity
        };

        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                capacity,
                rejected: 0,
            }),
        }
    }

    /// Convenience constructor returning a [`SharedQueue`].
    pub fn shared(capacity: usize) -> SharedQueue {
        Arc::new(Self::with_capacity(capacity))
    }

    // The queue holds plain strings; a panic elsewhere cannot leave them in
    // a torn state, so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `keyword` if there is room.
    ///
    /// Returns `false` and leaves the queue untouched when it already holds
    /// `capacity` items.
    pub fn push(&self, keyword: impl Into<String>) -> bool {
        let mut inner = self.lock();
        if inner.items.len() >= inner.capacity {
            inner.rejected += 1;
            return false;
        }
        inner.items.push_back(keyword.into());
        true
    }

    /// Remove and return the oldest keyword, or `None` if the queue is empty.
    pub fn pop_front(&self) -> Option<String> {
        self.lock().items.pop_front()
    }

    /// Remove every keyword, returning them oldest first.
    pub fn drain(&self) -> Vec<String> {
        self.lock().items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn clear(&self) {
        self.lock().items.clear();
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Number of keywords dropped because the queue was full.
    pub fn rejected(&self) -> u64 {
        self.lock().rejected
    }

    /// Change the maximum number of stored keywords.
    ///
    /// `0` is rejected and the capacity is left unchanged.  Shrinking below
    /// the current length keeps every stored keyword; only future pushes are
    /// refused until the queue drains below the new bound.
    pub fn set_capacity(&self, capacity: usize) -> bool {
        if capacity == 0 {
            log::warn!("keyword queue capacity must be > 0, keeping current capacity");
            return false;
        }

        let mut inner = self.lock();
        inner.capacity = capacity;
        if inner.items.len() > capacity {
            log::warn!(
                "keyword queue holds {} keywords, more than the new capacity {capacity}",
                inner.items.len()
            );
        }
        true
    }
}

impl Default for KeywordQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeywordQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("KeywordQueue")
            .field("len", &inner.items.len())
            .field("capacity", &inner.capacity)
            .field("rejected", &inner.rejected)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn default_capacity() {
        assert_eq!(KeywordQueue::new().capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn zero_capacity_falls_back_to_default() {
        assert_eq!(KeywordQueue::with_capacity(0).capacity(), DEFAULT_CAPACITY);
    }

    // ---- Bound -------------------------------------------------------------

    #[test]
    fn push_beyond_capacity_is_refused() {
        let queue = KeywordQueue::with_capacity(3);
        for kw in ["a", "b", "c"] {
            assert!(queue.push(kw));
        }

        assert!(!queue.push("d"));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.rejected(), 1);
        // The refused keyword must not have displaced anything.
        assert_eq!(queue.drain(), vec!["a", "b", "c"]);
    }

    #[test]
    fn len_never_exceeds_capacity() {
        let queue = KeywordQueue::with_capacity(5);
        for i in 0..50 {
            queue.push(format!("kw{i}"));
            assert!(queue.len() <= queue.capacity());
        }
        assert_eq!(queue.rejected(), 45);
    }

    // ---- Order -------------------------------------------------------------

    #[test]
    fn pop_front_is_fifo() {
        let queue = KeywordQueue::new();
        queue.push("a");
        queue.push("b");
        queue.push("c");

        assert_eq!(queue.pop_front().as_deref(), Some("a"));
        assert_eq!(queue.pop_front().as_deref(), Some("b"));
        assert_eq!(queue.pop_front().as_deref(), Some("c"));
    }

    #[test]
    fn pop_front_on_empty_returns_none() {
        let queue = KeywordQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn clear_empties_the_queue_but_keeps_capacity() {
        let queue = KeywordQueue::with_capacity(4);
        queue.push("x");
        queue.push("y");
        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 4);
        assert!(queue.push("z"));
    }

    // ---- Capacity changes --------------------------------------------------

    #[test]
    fn set_capacity_zero_is_rejected() {
        let queue = KeywordQueue::with_capacity(7);
        assert!(!queue.set_capacity(0));
        assert_eq!(queue.capacity(), 7);
    }

    #[test]
    fn shrinking_below_len_keeps_items_and_blocks_pushes() {
        let queue = KeywordQueue::with_capacity(5);
        for kw in ["1", "2", "3", "4", "5"] {
            queue.push(kw);
        }

        assert!(queue.set_capacity(3));
        assert_eq!(queue.len(), 5);
        assert!(!queue.push("6"));

        // Still refused at len == 3: there must be room *below* the bound.
        queue.pop_front();
        queue.pop_front();
        assert_eq!(queue.len(), 3);
        assert!(!queue.push("6"));

        queue.pop_front();
        assert!(queue.push("6"));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn growing_capacity_allows_more_pushes() {
        let queue = KeywordQueue::with_capacity(1);
        assert!(queue.push("a"));
        assert!(!queue.push("b"));
        assert!(queue.set_capacity(2));
        assert!(queue.push("b"));
    }

    // ---- Concurrency -------------------------------------------------------

    #[test]
    fn concurrent_producer_and_consumers_lose_nothing() {
        let queue = KeywordQueue::shared(1_000);
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..500 {
                    while !queue.push(format!("{i}")) {
                        thread::yield_now();
                    }
                }
            })
        };

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut got = Vec::new();
                    for _ in 0..10_000 {
                        if let Some(kw) = queue.pop_front() {
                            got.push(kw);
                        } else {
                            thread::yield_now();
                        }
                    }
                    got
                })
            })
            .collect();

        producer.join().unwrap();
        let mut seen: Vec<String> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        seen.extend(queue.drain());

        assert_eq!(seen.len(), 500);
        let mut numbers: Vec<u32> = seen.iter().map(|s| s.parse().unwrap()).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn shared_queue_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedQueue>();
    }
}
