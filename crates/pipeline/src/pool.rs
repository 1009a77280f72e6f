//! Event pool - bounded, reusable event storage
//!
//! The pool fixes the number of events that can exist in a pipeline.
//! `get()` blocks when every event is in flight, which is the back-pressure
//! path: a stalled output keeps events checked out, the pool drains, and
//! the input's read loop parks inside `ingest` until commits free events.
//!
//! Reused events are reset, not reallocated; the boxed allocation and the
//! `source_name` buffer survive across checkouts.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::event::Event;

pub(crate) struct EventPool {
    capacity: usize,

    /// Free list; events not here are in flight somewhere in the pipeline
    free: Mutex<Vec<Box<Event>>>,

    /// Signaled by `back` to wake checkouts parked on an empty pool
    available: Condvar,

    /// Mirror of the free-list length for lock-free observability
    free_events_count: AtomicUsize,

    /// Sequence ids handed out at checkout; starts at 1 so 0 means
    /// "never entered the pipeline"
    seq: AtomicU64,
}

impl EventPool {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "event pool capacity must be positive");

        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free.push(Box::new(Event::empty()));
        }

        Self {
            capacity,
            free: Mutex::new(free),
            available: Condvar::new(),
            free_events_count: AtomicUsize::new(capacity),
            seq: AtomicU64::new(0),
        }
    }

    /// Check an event out, blocking while the pool is drained.
    pub(crate) fn get(&self) -> Box<Event> {
        let mut free = self.free.lock();
        while free.is_empty() {
            self.available.wait(&mut free);
        }
        let mut event = free.pop().expect("free list is non-empty");
        self.free_events_count.store(free.len(), Ordering::Relaxed);
        drop(free);

        event.seq_id = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        event
    }

    /// Release an event back, waking one parked checkout.
    pub(crate) fn back(&self, mut event: Box<Event>) {
        event.reset();

        let mut free = self.free.lock();
        free.push(event);
        self.free_events_count.store(free.len(), Ordering::Relaxed);
        drop(free);

        self.available.notify_one();
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn free_events_count(&self) -> usize {
        self.free_events_count.load(Ordering::Relaxed)
    }

    /// Events currently in flight.
    #[inline]
    pub(crate) fn in_use(&self) -> usize {
        self.capacity - self.free_events_count()
    }

    /// Human-readable state for the admin status page.
    pub(crate) fn dump(&self) -> String {
        format!(
            "event pool: capacity={}, in use={}, free={}\n",
            self.capacity,
            self.in_use(),
            self.free_events_count(),
        )
    }
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod tests;
