//! Stream registry - the single source of ordering truth
//!
//! Maps `(SourceId, StreamName)` to its stream and keeps the ready set:
//! streams that have queued events and no owner. Workers block in
//! `attach` until a stream becomes ready, then own it exclusively until
//! they drain it.
//!
//! # Locking
//!
//! Registry lock first, then the stream lock, never the other way
//! around while both are held; `detach` releases the stream before
//! touching the registry. Neither lock is ever held across action
//! execution.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::event::{Event, SourceId, StreamName};
use crate::stream::Stream;

pub(crate) struct Streamer {
    inner: Mutex<StreamerInner>,

    /// Signaled when a stream enters the ready set
    ready: Condvar,
}

struct StreamerInner {
    streams: HashMap<(SourceId, StreamName), Arc<Stream>>,
    ready_set: VecDeque<Arc<Stream>>,
    stopped: bool,
}

impl Streamer {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(StreamerInner {
                streams: HashMap::new(),
                ready_set: VecDeque::new(),
                stopped: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Enqueue an event on its stream, creating the stream on first use.
    ///
    /// If the stream has no owner it enters the ready set and one waiting
    /// worker is woken. Returns the event's sequence id.
    pub(crate) fn put_event(
        &self,
        source_id: SourceId,
        stream_name: StreamName,
        mut event: Box<Event>,
    ) -> u64 {
        let seq_id = event.seq_id();

        let mut inner = self.inner.lock();
        let stream = inner
            .streams
            .entry((source_id, stream_name.clone()))
            .or_insert_with(|| Arc::new(Stream::new(source_id, stream_name)))
            .clone();

        event.stream = Some(Arc::clone(&stream));
        let became_ready = stream.push(event);
        if became_ready {
            inner.ready_set.push_back(stream);
            drop(inner);
            self.ready.notify_one();
        }

        seq_id
    }

    /// Take the next ready stream and own it.
    ///
    /// Blocks up to `timeout`; returns `None` on timeout or when the
    /// registry has stopped. Workers use the timeout to interleave
    /// re-injected events with stream work.
    pub(crate) fn attach(&self, worker_id: usize, timeout: Duration) -> Option<Arc<Stream>> {
        let mut inner = self.inner.lock();
        loop {
            if inner.stopped {
                return None;
            }
            if let Some(stream) = inner.ready_set.pop_front() {
                stream.assign(worker_id);
                return Some(stream);
            }
            if self.ready.wait_for(&mut inner, timeout).timed_out() {
                return None;
            }
        }
    }

    /// Give a drained stream back.
    ///
    /// If events arrived while the worker was finishing, the stream
    /// re-enters the ready set immediately.
    pub(crate) fn detach(&self, stream: Arc<Stream>) {
        if stream.release() {
            let mut inner = self.inner.lock();
            inner.ready_set.push_back(stream);
            drop(inner);
            self.ready.notify_one();
        }
    }

    /// Stop handing out streams; wakes every parked `attach`.
    pub(crate) fn stop(&self) {
        self.inner.lock().stopped = true;
        self.ready.notify_all();
    }

    #[inline]
    pub(crate) fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    /// Human-readable registry state for the admin status page.
    pub(crate) fn dump(&self) -> String {
        let inner = self.inner.lock();
        let mut out = format!(
            "streams: total={}, ready={}\n",
            inner.streams.len(),
            inner.ready_set.len(),
        );
        let mut streams: Vec<_> = inner.streams.values().collect();
        streams.sort_by_key(|s| (s.source_id(), s.name().clone()));
        for stream in streams {
            stream.describe(&mut out);
        }
        out
    }

    #[cfg(test)]
    pub(crate) fn stream_count(&self) -> usize {
        self.inner.lock().streams.len()
    }
}

#[cfg(test)]
#[path = "streamer_test.rs"]
mod tests;
