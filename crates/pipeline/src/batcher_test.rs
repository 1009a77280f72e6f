//! Tests for the output batcher

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::bail;
use parking_lot::Mutex;

use super::*;
use crate::event::Event;
use crate::plugin::OutputController;

fn event(offset: i64) -> Box<Event> {
    let mut event = Box::new(Event::empty());
    event.offset = offset;
    event
}

#[derive(Default)]
struct CollectController {
    committed: Mutex<Vec<i64>>,
}

impl OutputController for CollectController {
    fn commit(&self, event: Box<Event>) {
        self.committed.lock().push(event.offset);
    }

    fn error(&self, _message: &str) {}
}

struct CollectFlusher {
    /// Offsets per flushed batch, in flush order
    flushes: Mutex<Vec<Vec<i64>>>,

    /// How many flushes to fail before succeeding
    failures_left: AtomicUsize,

    /// Per-flush artificial delay keyed by batch parity, to shake up
    /// worker completion order
    stagger: bool,
}

impl CollectFlusher {
    fn new() -> Self {
        Self {
            flushes: Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(0),
            stagger: false,
        }
    }

    fn failing(times: usize) -> Self {
        let flusher = Self::new();
        flusher.failures_left.store(times, Ordering::Relaxed);
        flusher
    }
}

impl BatchFlusher for CollectFlusher {
    type Data = Vec<u8>;

    fn flush(&self, data: &mut Vec<u8>, batch: &Batch) -> anyhow::Result<()> {
        if self
            .failures_left
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
        {
            bail!("sink unavailable");
        }
        if self.stagger && batch.iter().next().map(|e| e.offset).unwrap_or(0) % 20 == 0 {
            thread::sleep(Duration::from_millis(30));
        }
        data.clear();
        for event in batch.iter() {
            event.encode(data);
        }
        self.flushes.lock().push(batch.iter().map(|e| e.offset).collect());
        Ok(())
    }
}

fn options(worker_count: usize, batch_size: usize, flush_timeout: Duration) -> BatcherOptions {
    BatcherOptions {
        pipeline_name: "test".into(),
        output_type: "collect".into(),
        worker_count,
        batch_size,
        flush_timeout,
        maintenance_interval: None,
    }
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) {
    let start = Instant::now();
    while !check() {
        assert!(start.elapsed() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_flush_at_batch_size() {
    let controller = Arc::new(CollectController::default());
    let batcher = Batcher::new(
        options(1, 3, Duration::ZERO),
        CollectFlusher::new(),
        controller.clone(),
    );
    batcher.start();

    for offset in 0..3 {
        batcher.add(event(offset));
    }

    wait_until(Duration::from_secs(2), || controller.committed.lock().len() == 3);
    assert_eq!(*controller.committed.lock(), vec![0, 1, 2]);
    batcher.stop();
}

#[test]
fn test_flush_on_age() {
    let controller = Arc::new(CollectController::default());
    let batcher = Batcher::new(
        options(1, 100, Duration::from_millis(40)),
        CollectFlusher::new(),
        controller.clone(),
    );
    batcher.start();

    batcher.add(event(1));
    batcher.add(event(2));

    // far below batch_size, so only the age bound can seal it
    wait_until(Duration::from_secs(2), || controller.committed.lock().len() == 2);
    batcher.stop();
}

#[test]
fn test_commits_follow_seal_order() {
    let controller = Arc::new(CollectController::default());
    let mut flusher = CollectFlusher::new();
    flusher.stagger = true;
    let batcher = Batcher::new(options(4, 10, Duration::ZERO), flusher, controller.clone());
    batcher.start();

    for offset in 0..40 {
        batcher.add(event(offset));
    }

    wait_until(Duration::from_secs(5), || controller.committed.lock().len() == 40);

    // four batches flushed on four workers with staggered delays, yet
    // the commit turnstile keeps intake order
    let committed = controller.committed.lock();
    assert_eq!(*committed, (0..40).collect::<Vec<i64>>());
    batcher.stop();
}

#[test]
fn test_failed_flush_retries_before_commit() {
    let controller = Arc::new(CollectController::default());
    let batcher = Batcher::new(
        options(1, 2, Duration::ZERO),
        CollectFlusher::failing(1),
        controller.clone(),
    );
    batcher.start();

    batcher.add(event(1));
    batcher.add(event(2));

    // the first attempt fails; nothing may commit until the retry lands
    thread::sleep(Duration::from_millis(100));
    assert!(controller.committed.lock().is_empty());

    wait_until(Duration::from_secs(3), || controller.committed.lock().len() == 2);
    batcher.stop();
}

#[test]
fn test_stop_flushes_pending_batch() {
    let controller = Arc::new(CollectController::default());
    let batcher = Batcher::new(
        options(1, 100, Duration::ZERO),
        CollectFlusher::new(),
        controller.clone(),
    );
    batcher.start();

    batcher.add(event(7));
    batcher.stop();

    assert_eq!(*controller.committed.lock(), vec![7]);
}

#[test]
fn test_worker_data_is_reused() {
    struct DataProbe {
        generations: Mutex<Vec<usize>>,
    }

    impl BatchFlusher for DataProbe {
        type Data = usize;

        fn flush(&self, data: &mut usize, _batch: &Batch) -> anyhow::Result<()> {
            self.generations.lock().push(*data);
            *data += 1;
            Ok(())
        }
    }

    let controller = Arc::new(CollectController::default());
    let batcher = Batcher::new(
        options(1, 1, Duration::ZERO),
        DataProbe {
            generations: Mutex::new(Vec::new()),
        },
        controller.clone(),
    );
    batcher.start();

    batcher.add(event(1));
    batcher.add(event(2));
    batcher.add(event(3));

    wait_until(Duration::from_secs(2), || controller.committed.lock().len() == 3);
    batcher.stop();

    // the same worker-owned value carried across all three flushes
    let generations = batcher.flusher.generations.lock();
    assert_eq!(*generations, vec![0, 1, 2]);
}
