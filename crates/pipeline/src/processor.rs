//! Processor - one worker of the fleet
//!
//! A processor is a single-threaded loop: own a ready stream, drain it
//! head-first, and run every event through the action chain. While an
//! action runs, the worker holds the event exclusively; the stream stays
//! checked out to the worker until its queue empties.
//!
//! # Action chain protocol
//!
//! Actions are numbered in configuration order and the event carries its
//! cursor. Each decision moves the event on:
//!
//! - `Pass` - advance the cursor; past the last action the event goes to
//!   the output plugin
//! - `Discard` - finalize now (the offset still commits) and account the
//!   event as discarded
//! - `Hold` - the action kept the event; the worker moves on, and the
//!   event returns later through the controller's re-injection queue
//!   (`propagate`) or finalizes directly (`commit`)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::event::{Event, EventKind};
use crate::metrics::{STATUS_DISCARDED, STATUS_PASSED, STATUS_RECEIVED};
use crate::pipeline::PipelineCore;
use crate::plugin::{ActionPlugin, ActionResult, OutputPlugin};

/// How long `attach` parks before the worker re-checks the re-injection
/// queue and its stop flag
const ATTACH_POLL: Duration = Duration::from_millis(50);

pub(crate) struct ActionUnit {
    /// Plugin type name, for logs
    pub(crate) name: String,

    /// Per-worker instance; never shared
    pub(crate) plugin: Box<dyn ActionPlugin>,
}

pub(crate) struct Processor {
    id: usize,
    core: Arc<PipelineCore>,
    output: Arc<dyn OutputPlugin>,
    actions: Vec<ActionUnit>,
    stop: Arc<AtomicBool>,
}

impl Processor {
    pub(crate) fn new(
        id: usize,
        core: Arc<PipelineCore>,
        output: Arc<dyn OutputPlugin>,
        actions: Vec<ActionUnit>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            core,
            output,
            actions,
            stop,
        }
    }

    pub(crate) fn run(mut self) {
        tracing::debug!(worker = self.id, actions = self.actions.len(), "processor started");

        loop {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }

            // held events resume mid-chain ahead of new stream work
            while let Ok(event) = self.core.reinject_rx.try_recv() {
                self.core.active_procs.fetch_add(1, Ordering::Relaxed);
                self.process_event(event);
                self.core.active_procs.fetch_sub(1, Ordering::Relaxed);
            }

            if self.core.streamer.is_stopped() {
                break;
            }
            let Some(stream) = self.core.streamer.attach(self.id, ATTACH_POLL) else {
                continue;
            };

            self.core.active_procs.fetch_add(1, Ordering::Relaxed);
            while let Some(event) = stream.pop() {
                self.process_event(event);
                if self.stop.load(Ordering::Relaxed) {
                    break;
                }
            }
            self.core.streamer.detach(stream);
            self.core.active_procs.fetch_sub(1, Ordering::Relaxed);
        }

        for action in &mut self.actions {
            action.plugin.stop();
        }
        tracing::debug!(worker = self.id, "processor stopped");
    }

    fn process_event(&mut self, event: Box<Event>) {
        if event.kind() == EventKind::Unlocked {
            return;
        }

        let mut event = event;
        let mut index = event.action_index;
        loop {
            if index >= self.actions.len() {
                self.output.out(event);
                return;
            }

            self.core.metrics.count_event(index, STATUS_RECEIVED);
            let before = self.core.samples.wants(index).then(|| event.root.clone());
            event.action_index = index;

            match self.actions[index].plugin.handle(event) {
                ActionResult::Pass(passed) => {
                    if let Some(before) = before {
                        self.core
                            .samples
                            .publish(index, before, Some(passed.root.clone()));
                    }
                    self.core.metrics.count_event(index, STATUS_PASSED);
                    event = passed;
                    index += 1;
                    event.action_index = index;
                }
                ActionResult::Discard(discarded) => {
                    if let Some(before) = before {
                        self.core.samples.publish(index, before, None);
                    }
                    self.core.metrics.count_event(index, STATUS_DISCARDED);
                    self.core.finalize(discarded, true, true);
                    return;
                }
                ActionResult::Hold => {
                    if let Some(before) = before {
                        self.core.samples.publish(index, before, None);
                    }
                    tracing::trace!(
                        worker = self.id,
                        action = %self.actions[index].name,
                        "event held by action"
                    );
                    return;
                }
            }
        }
    }
}
