//! Devnull output - commit and forget
//!
//! Accepts every event and commits it immediately. With an `on_out`
//! callback installed it doubles as the capture sink for tests and
//! benchmarks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use lumber_pipeline::{Event, OutputController, OutputPlugin, OutputPluginParams};

type OutFn = Box<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
pub struct DevNullOutput {
    controller: OnceLock<Arc<dyn OutputController>>,
    total: AtomicU64,
    out_fn: Mutex<Option<OutFn>>,
}

impl DevNullOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on every event before it commits.
    pub fn on_out(&self, f: impl Fn(&Event) + Send + Sync + 'static) {
        *self.out_fn.lock() = Some(Box::new(f));
    }

    /// How many events this output has swallowed.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl OutputPlugin for DevNullOutput {
    fn start(&self, params: OutputPluginParams) {
        let _ = self.controller.set(params.controller);
    }

    fn stop(&self) {}

    fn out(&self, event: Box<Event>) {
        if let Some(f) = self.out_fn.lock().as_ref() {
            f(&event);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
        self.controller
            .get()
            .expect("devnull output is not started")
            .commit(event);
    }
}
