//! Fake input - synthetic records pushed by hand
//!
//! The harness input: whatever owns the plugin feeds records through
//! [`FakeInput::ingest`] and observes offset commits coming back. Used by
//! the end-to-end tests and the load generator; real deployments tail
//! files or container logs instead.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use lumber_decoder::DecoderKind;
use lumber_pipeline::{Event, InputController, InputPlugin, InputPluginParams, SourceId};

type CommitFn = Box<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
pub struct FakeInput {
    controller: OnceLock<Arc<dyn InputController>>,

    /// Decoder to suggest at start, for pipelines configured `auto`
    suggest: Option<DecoderKind>,

    committed: AtomicU64,
    last_committed_offset: AtomicI64,
    commit_fn: Mutex<Option<CommitFn>>,
}

impl FakeInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suggest `kind` to the pipeline when it starts.
    pub fn with_suggested_decoder(kind: DecoderKind) -> Self {
        Self {
            suggest: Some(kind),
            ..Default::default()
        }
    }

    /// Push one record into the pipeline.
    ///
    /// Returns the event's sequence id, or 0 when the record was
    /// rejected. Panics if the pipeline has not started yet.
    pub fn ingest(&self, source_id: SourceId, source_name: &str, offset: i64, bytes: &[u8]) -> u64 {
        self.controller
            .get()
            .expect("fake input is not started")
            .ingest(source_id, source_name, offset, bytes, false)
    }

    /// Run `f` on every committed event, on the committing thread.
    pub fn on_commit(&self, f: impl Fn(&Event) + Send + Sync + 'static) {
        *self.commit_fn.lock() = Some(Box::new(f));
    }

    /// How many events have committed so far.
    pub fn committed_count(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Offset of the most recently committed event.
    pub fn last_committed_offset(&self) -> i64 {
        self.last_committed_offset.load(Ordering::Relaxed)
    }
}

impl InputPlugin for FakeInput {
    fn start(&self, params: InputPluginParams) {
        if let Some(kind) = self.suggest {
            params.controller.suggest_decoder(kind);
        }
        let _ = self.controller.set(params.controller);
    }

    fn stop(&self) {}

    fn commit(&self, event: &Event) {
        self.last_committed_offset.store(event.offset, Ordering::Relaxed);
        self.committed.fetch_add(1, Ordering::Relaxed);
        if let Some(f) = self.commit_fn.lock().as_ref() {
            f(event);
        }
    }
}
