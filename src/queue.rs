//! FIFO hand-off queues between pipeline stages.
//!
//! Each stage drains its input with `while let Some(item) = queue.pop()` rather
//! than polling `len()`, so a stage never observes a half-filled queue.

use std::collections::VecDeque;

/// Ordered, unbounded FIFO queue
///
/// Insertion order is the only ordering guarantee. [`WorkQueue::requeue_front`]
/// exists solely to put back an item that was popped but not processed (e.g. a
/// post whose retry wait was cancelled), so that it keeps its place at the head.
#[derive(Debug, Clone)]
pub struct WorkQueue<T> {
    items: VecDeque<T>,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Append an item at the tail
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    /// Remove and return the head item
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Put a popped-but-unprocessed item back at the head
    pub fn requeue_front(&mut self, item: T) {
        self.items.push_front(item);
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate head to tail without consuming
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T> Extend<T> for WorkQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<T> FromIterator<T> for WorkQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
