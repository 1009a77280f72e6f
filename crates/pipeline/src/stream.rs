//! Stream - one ordered FIFO of events
//!
//! A stream is identified by `(SourceId, StreamName)` and is the unit of
//! ordering: events queued on the same stream reach the action chain and
//! the output in enqueue order, because at most one worker owns a stream
//! at a time and it drains the queue head-first.
//!
//! Ownership state machine (guarded by the stream mutex, transitions
//! driven by the registry):
//!
//! ```text
//! idle ──put──▶ queued ──attach──▶ owned ──drained──▶ idle
//!                  ▲                  │
//!                  └────put while owned┘   (stays owned, no re-queue)
//! ```

use std::collections::VecDeque;
use std::fmt::Write as _;

use parking_lot::Mutex;

use crate::event::{Event, SourceId, StreamName};

pub(crate) struct Stream {
    source_id: SourceId,
    name: StreamName,
    inner: Mutex<StreamInner>,
}

#[derive(Default)]
struct StreamInner {
    queue: VecDeque<Box<Event>>,

    /// Worker currently draining this stream, if any
    owner: Option<usize>,

    /// Whether the stream sits in the registry's ready set
    attached: bool,

    /// Events dequeued by a worker but not yet committed
    awaiting: u64,
}

impl Stream {
    pub(crate) fn new(source_id: SourceId, name: StreamName) -> Self {
        Self {
            source_id,
            name,
            inner: Mutex::new(StreamInner::default()),
        }
    }

    #[inline]
    pub(crate) fn source_id(&self) -> SourceId {
        self.source_id
    }

    #[inline]
    pub(crate) fn name(&self) -> &StreamName {
        &self.name
    }

    /// Append an event. Returns true when the stream just became ready
    /// (has events, no owner, not yet in the ready set) and the caller
    /// must insert it there.
    pub(crate) fn push(&self, event: Box<Event>) -> bool {
        let mut inner = self.inner.lock();
        inner.queue.push_back(event);
        if inner.owner.is_none() && !inner.attached {
            inner.attached = true;
            true
        } else {
            false
        }
    }

    /// Hand ownership to a worker popped from the ready set.
    pub(crate) fn assign(&self, worker_id: usize) {
        let mut inner = self.inner.lock();
        debug_assert!(inner.owner.is_none(), "stream already owned");
        inner.owner = Some(worker_id);
        inner.attached = false;
    }

    /// Dequeue the head event; owner only.
    pub(crate) fn pop(&self) -> Option<Box<Event>> {
        let mut inner = self.inner.lock();
        let event = inner.queue.pop_front();
        if event.is_some() {
            inner.awaiting += 1;
        }
        event
    }

    /// Drop ownership. Returns true when events arrived while the worker
    /// was letting go and the stream must re-enter the ready set.
    pub(crate) fn release(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.owner = None;
        if !inner.queue.is_empty() && !inner.attached {
            inner.attached = true;
            true
        } else {
            false
        }
    }

    /// Account one committed event.
    pub(crate) fn commit(&self) {
        let mut inner = self.inner.lock();
        inner.awaiting = inner.awaiting.saturating_sub(1);
    }

    #[cfg(test)]
    pub(crate) fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub(crate) fn describe(&self, out: &mut String) {
        let inner = self.inner.lock();
        let _ = writeln!(
            out,
            "  {}/{}: queued={}, awaiting={}, owner={}",
            self.source_id,
            self.name,
            inner.queue.len(),
            inner.awaiting,
            match inner.owner {
                Some(id) => format!("worker:{id}"),
                None => "none".to_string(),
            },
        );
    }
}
