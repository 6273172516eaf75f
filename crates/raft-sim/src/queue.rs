//! # queue
//!
//! why: order deferred deliveries by simulated time without wall-clock timers
//! relations: owned by network.rs, polled on every global tick
//! what: EventQueue, a min-heap keyed by (deadline, insertion sequence)

use raft_election::Millis;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Entry<T> {
    at: Millis,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // reversed: BinaryHeap is a max-heap, we want the earliest deadline on top
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Deferred actions keyed by absolute simulated time.
///
/// Entries sharing a deadline come out in insertion order, so a run is fully
/// determined by the sequence of pushes.
pub struct EventQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `item` for time `at`
    pub fn push(&mut self, at: Millis, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { at, seq, item });
    }

    /// Pop the earliest entry whose deadline is at or before `now`
    pub fn pop_due(&mut self, now: Millis) -> Option<(Millis, T)> {
        if self.heap.peek()?.at > now {
            return None;
        }
        self.heap.pop().map(|entry| (entry.at, entry.item))
    }

    /// Deadline of the next entry, if any
    pub fn peek_time(&self) -> Option<Millis> {
        self.heap.peek().map(|entry| entry.at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.heap.len())
            .field("next_at", &self.peek_time())
            .finish()
    }
}
