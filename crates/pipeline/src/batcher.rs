//! Batcher - output-side event aggregation
//!
//! Network-bound outputs hand their events to a batcher instead of
//! writing one record at a time. The batcher accumulates events into
//! batches bounded by size and age, and a fixed fleet of worker threads
//! flushes them through the output's [`BatchFlusher`].
//!
//! # Design
//!
//! - **At-least-once**: a failing flush retries forever with a one-second
//!   back-off; events commit only after the flush succeeds
//! - **Ordered commits**: batches carry a seal sequence and workers pass
//!   a commit turnstile in that order, so commits stay contiguous in
//!   intake order per stream even with many workers
//! - **Bounded**: a free-batch pool of `worker_count` batches makes `add`
//!   block when every worker is busy - back-pressure toward the workers
//!   and, through them, the event pool and the input
//! - **Reusable worker state**: each worker owns one `Data` value across
//!   batches, so outputs can keep an encode buffer warm

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};

use crate::event::Event;
use crate::plugin::OutputController;

/// Back-off between flush retries
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// How a batching output turns one batch into bytes on the wire.
///
/// `Data` is per-worker scratch state (typically an encode buffer),
/// default-initialized when the worker starts and reused across batches.
pub trait BatchFlusher: Send + Sync + 'static {
    type Data: Default + Send;

    /// Deliver one batch. Failing is fine: the batcher retries until
    /// this returns `Ok`, so implementations should be idempotent where
    /// the sink allows it.
    fn flush(&self, data: &mut Self::Data, batch: &Batch) -> anyhow::Result<()>;

    /// Periodic housekeeping on idle workers; only called when the
    /// batcher is configured with a maintenance interval.
    fn maintenance(&self, _data: &mut Self::Data) {}
}

/// Batcher configuration.
#[derive(Debug, Clone)]
pub struct BatcherOptions {
    pub pipeline_name: String,

    /// Output plugin type, for logs
    pub output_type: String,

    /// Worker threads flushing batches
    pub worker_count: usize,

    /// Seal a batch at this many events
    pub batch_size: usize,

    /// Seal a non-empty batch this long after its first event;
    /// zero disables age-based sealing
    pub flush_timeout: Duration,

    /// Call [`BatchFlusher::maintenance`] on workers idle this long
    pub maintenance_interval: Option<Duration>,
}

/// A sealed (or accumulating) sequence of events bound for one flush.
pub struct Batch {
    events: Vec<Box<Event>>,

    /// Seal order; the commit turnstile advances in this order
    seq: u64,

    /// When the first event of this batch arrived
    first_at: Option<Instant>,
}

impl Batch {
    fn new(size_hint: usize) -> Self {
        Self {
            events: Vec::with_capacity(size_hint),
            seq: 0,
            first_at: None,
        }
    }

    fn reset(&mut self, seq: u64) {
        self.events.clear();
        self.seq = seq;
        self.first_at = None;
    }

    fn append(&mut self, event: Box<Event>) {
        if self.first_at.is_none() {
            self.first_at = Some(Instant::now());
        }
        self.events.push(event);
    }

    fn age(&self) -> Duration {
        self.first_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in intake order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().map(|event| &**event)
    }
}

struct BatcherState {
    /// Batch currently accumulating, if any
    current: Option<Batch>,

    /// Next seal sequence to hand out
    next_seq: u64,
}

pub struct Batcher<F: BatchFlusher> {
    opts: BatcherOptions,
    flusher: F,
    controller: Arc<dyn OutputController>,

    state: Mutex<BatcherState>,

    /// Sealed batches on their way to workers; `None` after stop
    full_tx: Mutex<Option<Sender<Batch>>>,
    full_rx: Receiver<Batch>,

    /// Recycled batches; drained empty means every worker is busy
    free_tx: Sender<Batch>,
    free_rx: Receiver<Batch>,

    /// Commit turnstile: seal sequence allowed to commit next
    commit_seq: Mutex<u64>,
    commit_done: Condvar,

    stopped: AtomicBool,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl<F: BatchFlusher> Batcher<F> {
    pub fn new(opts: BatcherOptions, flusher: F, controller: Arc<dyn OutputController>) -> Arc<Self> {
        let worker_count = opts.worker_count.max(1);
        let batch_size = opts.batch_size.max(1);

        let (full_tx, full_rx) = bounded(worker_count);
        let (free_tx, free_rx) = bounded(worker_count);
        for _ in 0..worker_count {
            let _ = free_tx.send(Batch::new(batch_size));
        }

        Arc::new(Self {
            opts: BatcherOptions {
                worker_count,
                batch_size,
                ..opts
            },
            flusher,
            controller,
            state: Mutex::new(BatcherState {
                current: None,
                next_seq: 0,
            }),
            full_tx: Mutex::new(Some(full_tx)),
            full_rx,
            free_tx,
            free_rx,
            commit_seq: Mutex::new(0),
            commit_done: Condvar::new(),
            stopped: AtomicBool::new(false),
            threads: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the worker fleet and the age-based sealer.
    pub fn start(self: &Arc<Self>) {
        let mut threads = self.threads.lock();
        if !threads.is_empty() {
            return;
        }

        tracing::info!(
            pipeline = %self.opts.pipeline_name,
            output = %self.opts.output_type,
            workers = self.opts.worker_count,
            batch_size = self.opts.batch_size,
            flush_timeout_ms = self.opts.flush_timeout.as_millis() as u64,
            "starting batcher"
        );

        for worker_id in 0..self.opts.worker_count {
            let batcher = Arc::clone(self);
            threads.push(thread::spawn(move || batcher.run_worker(worker_id)));
        }

        if !self.opts.flush_timeout.is_zero() {
            let batcher = Arc::clone(self);
            threads.push(thread::spawn(move || batcher.run_heartbeat()));
        }
    }

    /// Hand one event to the batcher.
    ///
    /// Blocks while every batch is riding a worker; that stall propagates
    /// through the calling worker back to the event pool and the input.
    pub fn add(&self, event: Box<Event>) {
        let sealed = {
            let mut state = self.state.lock();
            if state.current.is_none() {
                match self.free_rx.recv() {
                    Ok(mut batch) => {
                        batch.reset(state.next_seq);
                        state.next_seq += 1;
                        state.current = Some(batch);
                    }
                    Err(_) => return,
                }
            }
            let Some(current) = state.current.as_mut() else {
                return;
            };
            current.append(event);
            if current.len() >= self.opts.batch_size {
                state.current.take()
            } else {
                None
            }
        };

        if let Some(batch) = sealed {
            self.seal(batch);
        }
    }

    /// Seal pending work, stop the workers, and join them.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::Relaxed) {
            return;
        }

        let pending = self.state.lock().current.take();
        if let Some(batch) = pending {
            if !batch.is_empty() {
                self.seal(batch);
            }
        }

        // dropping the sender lets workers drain the channel and exit
        *self.full_tx.lock() = None;

        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in threads {
            let _ = handle.join();
        }
    }

    fn seal(&self, batch: Batch) {
        let sender = self.full_tx.lock();
        match sender.as_ref() {
            Some(tx) => {
                let _ = tx.send(batch);
            }
            None => {
                tracing::warn!(
                    output = %self.opts.output_type,
                    events = batch.len(),
                    "batcher already stopped, dropping sealed batch"
                );
            }
        }
    }

    fn run_worker(self: Arc<Self>, worker_id: usize) {
        let mut data = F::Data::default();

        loop {
            let batch = if let Some(interval) = self.opts.maintenance_interval {
                match self.full_rx.recv_timeout(interval) {
                    Ok(batch) => batch,
                    Err(RecvTimeoutError::Timeout) => {
                        self.flusher.maintenance(&mut data);
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match self.full_rx.recv() {
                    Ok(batch) => batch,
                    Err(_) => break,
                }
            };

            let flushed = self.flush_with_retry(&mut data, &batch, worker_id);
            self.commit_batch(batch, flushed);
        }

        tracing::debug!(
            worker = worker_id,
            output = %self.opts.output_type,
            "batcher worker stopped"
        );
    }

    /// Seal the accumulating batch once it outlives the flush timeout.
    fn run_heartbeat(self: Arc<Self>) {
        let poll = (self.opts.flush_timeout / 4)
            .clamp(Duration::from_millis(1), Duration::from_millis(100));
        loop {
            thread::sleep(poll);
            if self.stopped.load(Ordering::Relaxed) {
                return;
            }
            let sealed = {
                let mut state = self.state.lock();
                match state.current.as_ref() {
                    Some(batch)
                        if !batch.is_empty() && batch.age() >= self.opts.flush_timeout =>
                    {
                        state.current.take()
                    }
                    _ => None,
                }
            };
            if let Some(batch) = sealed {
                self.seal(batch);
            }
        }
    }

    /// Retry the flush until it lands; gives up only on shutdown.
    fn flush_with_retry(&self, data: &mut F::Data, batch: &Batch, worker_id: usize) -> bool {
        loop {
            match self.flusher.flush(data, batch) {
                Ok(()) => return true,
                Err(error) => {
                    tracing::error!(
                        worker = worker_id,
                        output = %self.opts.output_type,
                        %error,
                        events = batch.len(),
                        "batch flush failed, retrying"
                    );
                    if self.stopped.load(Ordering::Relaxed) {
                        return false;
                    }
                    thread::sleep(RETRY_BACKOFF);
                }
            }
        }
    }

    /// Pass the commit turnstile in seal order, then recycle the batch.
    ///
    /// `commit` is false when shutdown abandoned the flush; the slot still
    /// advances so later batches are not stuck behind it.
    fn commit_batch(&self, mut batch: Batch, commit: bool) {
        let mut seq = self.commit_seq.lock();
        while *seq != batch.seq {
            self.commit_done.wait(&mut seq);
        }
        if commit {
            for event in batch.events.drain(..) {
                self.controller.commit(event);
            }
        } else {
            batch.events.clear();
        }
        *seq += 1;
        self.commit_done.notify_all();
        drop(seq);

        let _ = self.free_tx.send(batch);
    }
}

#[cfg(test)]
#[path = "batcher_test.rs"]
mod tests;
