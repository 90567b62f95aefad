//! Scheduling data structures.
//!
//! The kernel's policy is plain FIFO: whoever became ready first runs
//! first. Joins are tracked in a table holding at most one waiter per
//! target. Both types are generic over the handle they store so they can
//! be tested without a kernel.

use std::collections::hash_map::{Entry, HashMap};
use std::collections::VecDeque;

use crate::id::Pid;

/// A strict FIFO queue of runnable processes.
pub struct ReadyQueue<T> {
    queue: VecDeque<T>,
}

impl<T> ReadyQueue<T> {
    /// Creates an empty ready queue.
    pub const fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Appends `item` at the tail.
    pub fn push(&mut self, item: T) {
        self.queue.push_back(item);
    }

    /// Removes and returns the head.
    pub fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    /// Whether any queued item satisfies `pred`.
    pub fn contains_by(&self, pred: impl FnMut(&T) -> bool) -> bool {
        self.queue.iter().any(pred)
    }

    /// Iterates from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.queue.iter()
    }

    /// Returns the number of queued items.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops every queued item.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T> Default for ReadyQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a join target to the single process waiting for it to exit.
pub struct WaitTable<T> {
    waiters: HashMap<Pid, T>,
}

impl<T> WaitTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            waiters: HashMap::new(),
        }
    }

    /// Records `waiter` as waiting on `target`.
    ///
    /// A target has at most one waiter: a second registration replaces the
    /// first, and the displaced waiter is returned.
    pub fn register(&mut self, target: Pid, waiter: T) -> Option<T> {
        match self.waiters.entry(target) {
            Entry::Occupied(mut slot) => Some(slot.insert(waiter)),
            Entry::Vacant(slot) => {
                slot.insert(waiter);
                None
            }
        }
    }

    /// Removes and returns the waiter on `target`.
    pub fn take(&mut self, target: Pid) -> Option<T> {
        self.waiters.remove(&target)
    }

    /// Whether anyone waits on `target`.
    pub fn is_waited_on(&self, target: Pid) -> bool {
        self.waiters.contains_key(&target)
    }

    /// Returns the number of pending joins.
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Returns `true` if no join is pending.
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Drops every pending join.
    pub fn clear(&mut self) {
        self.waiters.clear();
    }
}

impl<T> Default for WaitTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
