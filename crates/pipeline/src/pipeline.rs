//! Pipeline controller - wiring and lifecycle
//!
//! Owns every core structure of one pipeline, exposes the controller
//! surfaces plugins talk to, and runs the two background loops: the
//! maintenance tick (antispam decay, metrics rotation, stats line,
//! sample flush) and the worker-growth supervisor.
//!
//! # Intake
//!
//! `ingest` is the single entry point for raw records: empty check →
//! antispam → pool checkout (blocking on exhaustion) → decode → metadata
//! stamping → stream enqueue. A zero return means the record was
//! rejected and will never commit.
//!
//! # Shutdown
//!
//! `stop` halts components in order: workers first (in-flight events may
//! drop without commit), then the stream registry, then the input, then
//! the output. The background loops observe the flag and exit on their
//! next tick.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use lumber_decoder::{self as decoder, DecoderKind};

use crate::antispam::Antispamer;
use crate::error::{PipelineError, Result};
use crate::event::{default_stream_name, Event, SourceId};
use crate::metrics::MetricsHolder;
use crate::plugin::{
    ActionController, ActionInfo, ActionPluginParams, EndpointFn, InputController,
    InputPluginInfo, InputPluginParams, OutputController, OutputPluginInfo, OutputPluginParams,
    PluginDefaultParams,
};
use crate::pool::EventPool;
use crate::processor::{ActionUnit, Processor};
use crate::sample::{Sample, SampleHub};
use crate::streamer::Streamer;
use crate::{
    DEFAULT_AVG_LOG_SIZE, DEFAULT_CAPACITY, DEFAULT_MAINTENANCE_INTERVAL, DEFAULT_STREAM_FIELD,
    GROW_PROCS_INTERVAL, MAX_PROCS_SOFT_CAP, METRICS_GEN_INTERVAL,
};

/// Per-pipeline configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Intake decoder; `Auto` defers to the input plugin's suggestion
    pub decoder: DecoderKind,

    /// Event pool size - the back-pressure width
    pub capacity: usize,

    /// Tick of antispam decay, metrics rotation, and the stats line
    pub maintenance_interval: Duration,

    /// Intake bursts per maintenance tick before a source is banned;
    /// zero disables the filter
    pub antispam_threshold: u64,

    /// Average record size hint, used by outputs to size batch buffers
    pub avg_log_size: usize,

    /// Document field whose string value names the stream
    pub stream_field: String,

    /// Promote decode and runtime errors to process aborts
    pub is_strict: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            decoder: DecoderKind::Auto,
            capacity: DEFAULT_CAPACITY,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            antispam_threshold: 0,
            avg_log_size: DEFAULT_AVG_LOG_SIZE,
            stream_field: DEFAULT_STREAM_FIELD.to_string(),
            is_strict: false,
        }
    }
}

/// One status/count pair of an action's metric, as served by the admin
/// surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: u64,
}

/// Everything the hot path and the plugins share.
///
/// Split from [`Pipeline`] so workers and plugin controllers hold only
/// this, while the pipeline alone owns the worker handles and wiring.
pub(crate) struct PipelineCore {
    pub(crate) name: String,
    pub(crate) settings: Arc<Settings>,

    /// Decoder suggested by the input plugin, used when configured `auto`
    suggested_decoder: Mutex<Option<DecoderKind>>,

    pub(crate) pool: EventPool,
    pub(crate) streamer: Streamer,
    antispam: Antispamer,
    pub(crate) metrics: MetricsHolder,
    pub(crate) samples: SampleHub,

    input: OnceLock<Arc<dyn crate::plugin::InputPlugin>>,
    output: OnceLock<Arc<dyn crate::plugin::OutputPlugin>>,

    use_spread: AtomicBool,
    disable_streams: AtomicBool,
    should_stop: AtomicBool,

    /// Target and momentarily-busy worker counts, shared with the
    /// growth supervisor
    pub(crate) proc_count: AtomicI32,
    pub(crate) active_procs: AtomicI32,

    /// Held events re-entering the chain via `propagate`
    reinject_tx: Sender<Box<Event>>,
    pub(crate) reinject_rx: Receiver<Box<Event>>,

    total_committed: AtomicU64,
    total_size: AtomicU64,
    max_size: AtomicUsize,

    /// First-record input sample and parity-sampled output sample,
    /// flushed to the log by the maintenance loop
    in_sample_taken: AtomicBool,
    in_sample: Mutex<Option<String>>,
    out_sample_taken: AtomicBool,
    out_sample: Mutex<Option<String>>,

    /// Debug buffer of committed documents; rare path, mutex is fine
    event_log_enabled: AtomicBool,
    event_log: Mutex<Vec<String>>,
}

impl PipelineCore {
    fn resolve_decoder(&self) -> DecoderKind {
        let kind = match self.settings.decoder {
            DecoderKind::Auto => {
                (*self.suggested_decoder.lock()).unwrap_or(DecoderKind::Json)
            }
            kind => kind,
        };
        if kind == DecoderKind::Auto {
            DecoderKind::Json
        } else {
            kind
        }
    }

    /// Route a stamped event onto its stream.
    fn stream_event(&self, mut event: Box<Event>) -> u64 {
        if self.use_spread.load(Ordering::Relaxed) {
            // trade source affinity for fleet-wide balance
            let procs = self.proc_count.load(Ordering::Relaxed).max(1) as u64;
            event.source_id = SourceId(event.seq_id() % procs);
        }

        if !self.disable_streams.load(Ordering::Relaxed) {
            let name: Option<crate::event::StreamName> = event
                .root
                .get(self.settings.stream_field.as_str())
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .map(Arc::from);
            if let Some(name) = name {
                event.stream_name = name;
            }
        }

        let source_id = event.source_id;
        let stream_name = event.stream_name.clone();
        self.streamer.put_event(source_id, stream_name, event)
    }

    /// Complete one event's life.
    ///
    /// `notify_input` commits the offset and feeds the throughput
    /// counters; `back_event` returns the event to the pool. With
    /// `back_event` false the event is handed back to the caller, which
    /// keeps responsibility for it. Synthetic timeout events are ignored
    /// entirely - they were never checked out.
    pub(crate) fn finalize(
        &self,
        event: Box<Event>,
        notify_input: bool,
        back_event: bool,
    ) -> Option<Box<Event>> {
        if event.is_timeout_kind() {
            return None;
        }

        let mut event = event;
        if notify_input {
            if let Some(input) = self.input.get() {
                input.commit(&event);
            }
            self.total_committed.fetch_add(1, Ordering::Relaxed);
            self.total_size.fetch_add(event.size as u64, Ordering::Relaxed);
            self.max_size.fetch_max(event.size, Ordering::Relaxed);

            if !self.out_sample_taken.load(Ordering::Relaxed) && event.seq_id() & 1 == 1 {
                let mut sample = self.out_sample.lock();
                if sample.is_none() {
                    *sample = Some(event.encode_to_string());
                    self.out_sample_taken.store(true, Ordering::Relaxed);
                }
            }
        }

        if let Some(stream) = event.stream.take() {
            stream.commit();
        }

        if !back_event {
            return Some(event);
        }

        if self.event_log_enabled.load(Ordering::Relaxed) {
            self.event_log.lock().push(event.encode_to_string());
        }

        self.pool.back(event);
        None
    }

    /// Log and abort, or just log, depending on strictness.
    fn strict_error(&self, message: &str) {
        if self.settings.is_strict {
            tracing::error!(pipeline = %self.name, message, "fatal pipeline error");
            std::process::exit(1);
        }
        tracing::error!(pipeline = %self.name, message, "pipeline error");
    }
}

impl InputController for PipelineCore {
    fn ingest(
        &self,
        source_id: SourceId,
        source_name: &str,
        offset: i64,
        bytes: &[u8],
        is_new_source: bool,
    ) -> u64 {
        let length = bytes.len();
        let is_empty = length == 0 || (length == 1 && bytes[0] == b'\n');
        if is_empty || self.antispam.is_spam(source_id, source_name, is_new_source) {
            return 0;
        }

        // blocks while the pool is drained - back-pressure on the input
        let mut event = self.pool.get();

        match decoder::decode(self.resolve_decoder(), bytes) {
            Ok(root) => event.root = root,
            Err(error) => {
                self.pool.back(event);
                if self.settings.is_strict {
                    tracing::error!(
                        pipeline = %self.name,
                        %error,
                        offset,
                        length,
                        source = %source_id,
                        source_name,
                        "failed to decode record"
                    );
                    std::process::exit(1);
                }
                tracing::error!(
                    pipeline = %self.name,
                    %error,
                    offset,
                    length,
                    source = %source_id,
                    source_name,
                    "failed to decode record, dropping"
                );
                return 0;
            }
        }

        event.offset = offset;
        event.source_id = source_id;
        event.source_name.clear();
        event.source_name.push_str(source_name);
        event.stream_name = default_stream_name();
        event.size = length;

        if !self.in_sample_taken.load(Ordering::Relaxed) {
            let mut sample = self.in_sample.lock();
            if sample.is_none() {
                *sample = Some(event.encode_to_string());
                self.in_sample_taken.store(true, Ordering::Relaxed);
            }
        }

        self.stream_event(event)
    }

    fn use_spread(&self) {
        self.use_spread.store(true, Ordering::Relaxed);
    }

    fn disable_streams(&self) {
        self.disable_streams.store(true, Ordering::Relaxed);
    }

    fn suggest_decoder(&self, kind: DecoderKind) {
        *self.suggested_decoder.lock() = Some(kind);
    }
}

impl ActionController for PipelineCore {
    fn commit(&self, event: Box<Event>) {
        self.finalize(event, true, true);
    }

    fn propagate(&self, mut event: Box<Event>) {
        event.action_index += 1;
        let _ = self.reinject_tx.send(event);
    }
}

impl OutputController for PipelineCore {
    fn commit(&self, event: Box<Event>) {
        self.finalize(event, true, true);
    }

    fn error(&self, message: &str) {
        self.strict_error(message);
    }
}

struct ProcHandle {
    stop: Arc<AtomicBool>,
    join: thread::JoinHandle<()>,
}

/// One pipeline: input → actions → output, plus everything in between.
pub struct Pipeline {
    core: Arc<PipelineCore>,

    input_info: Mutex<Option<InputPluginInfo>>,
    output_info: Mutex<Option<OutputPluginInfo>>,
    action_infos: Mutex<Vec<ActionInfo>>,

    procs: Mutex<Vec<ProcHandle>>,
    single_proc: AtomicBool,
    started: AtomicBool,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, settings: Settings) -> Arc<Self> {
        let name = name.into();
        let settings = Arc::new(settings);
        let (reinject_tx, reinject_rx) = unbounded();

        let core = Arc::new(PipelineCore {
            name: name.clone(),
            suggested_decoder: Mutex::new(None),
            pool: EventPool::new(settings.capacity),
            streamer: Streamer::new(),
            antispam: Antispamer::new(settings.antispam_threshold),
            metrics: MetricsHolder::new(METRICS_GEN_INTERVAL),
            samples: SampleHub::new(),
            input: OnceLock::new(),
            output: OnceLock::new(),
            use_spread: AtomicBool::new(false),
            disable_streams: AtomicBool::new(false),
            should_stop: AtomicBool::new(false),
            proc_count: AtomicI32::new(0),
            active_procs: AtomicI32::new(0),
            reinject_tx,
            reinject_rx,
            total_committed: AtomicU64::new(0),
            total_size: AtomicU64::new(0),
            max_size: AtomicUsize::new(0),
            in_sample_taken: AtomicBool::new(false),
            in_sample: Mutex::new(None),
            out_sample_taken: AtomicBool::new(false),
            out_sample: Mutex::new(None),
            event_log_enabled: AtomicBool::new(false),
            event_log: Mutex::new(Vec::new()),
            settings,
        });

        Arc::new(Self {
            core,
            input_info: Mutex::new(None),
            output_info: Mutex::new(None),
            action_infos: Mutex::new(Vec::new()),
            procs: Mutex::new(Vec::new()),
            single_proc: AtomicBool::new(false),
            started: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.core.settings)
    }

    pub fn set_input(&self, info: InputPluginInfo) {
        if self.core.input.set(Arc::clone(&info.plugin)).is_err() {
            panic!("input is already set for pipeline {:?}", self.core.name);
        }
        *self.input_info.lock() = Some(info);
    }

    pub fn set_output(&self, info: OutputPluginInfo) {
        if self.core.output.set(Arc::clone(&info.plugin)).is_err() {
            panic!("output is already set for pipeline {:?}", self.core.name);
        }
        *self.output_info.lock() = Some(info);
    }

    /// Append an action to the chain; configuration order is execution
    /// order.
    pub fn add_action(&self, info: ActionInfo) {
        self.core.metrics.add_action(info.metric_name.clone());
        self.action_infos.lock().push(info);
    }

    /// Run every worker on a single thread; used by deterministic tests
    /// and tiny deployments. Must be called before `start`.
    pub fn disable_parallelism(&self) {
        self.single_proc.store(true, Ordering::Relaxed);
    }

    fn default_params(&self) -> PluginDefaultParams {
        PluginDefaultParams {
            pipeline_name: self.core.name.clone(),
            settings: Arc::clone(&self.core.settings),
        }
    }

    pub fn start(self: &Arc<Self>) {
        assert!(
            !self.started.swap(true, Ordering::SeqCst),
            "pipeline {:?} started twice",
            self.core.name
        );
        let input = self
            .core
            .input
            .get()
            .unwrap_or_else(|| panic!("input isn't set for pipeline {:?}", self.core.name))
            .clone();
        let output = self
            .core
            .output
            .get()
            .unwrap_or_else(|| panic!("output isn't set for pipeline {:?}", self.core.name))
            .clone();

        let proc_count = if self.single_proc.load(Ordering::Relaxed) {
            1
        } else {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1) * 2
        };
        self.core.proc_count.store(proc_count as i32, Ordering::SeqCst);

        let output_type = self
            .output_info
            .lock()
            .as_ref()
            .map(|i| i.type_name.clone())
            .unwrap_or_default();
        let input_type = self
            .input_info
            .lock()
            .as_ref()
            .map(|i| i.type_name.clone())
            .unwrap_or_default();

        tracing::info!(
            pipeline = %self.core.name,
            procs = proc_count,
            actions = self.action_infos.lock().len(),
            "starting pipeline"
        );

        tracing::info!(pipeline = %self.core.name, plugin = %output_type, "starting output plugin");
        output.start(OutputPluginParams {
            defaults: self.default_params(),
            controller: self.core.clone(),
        });

        for id in 0..proc_count {
            self.spawn_proc(id);
        }

        tracing::info!(pipeline = %self.core.name, plugin = %input_type, "starting input plugin");
        input.start(InputPluginParams {
            defaults: self.default_params(),
            controller: self.core.clone(),
        });

        {
            let pipeline = Arc::clone(self);
            thread::spawn(move || pipeline.run_maintenance());
        }
        {
            let pipeline = Arc::clone(self);
            thread::spawn(move || pipeline.run_grow_procs());
        }
    }

    pub fn stop(&self) {
        tracing::info!(
            pipeline = %self.core.name,
            total_committed = self.core.total_committed.load(Ordering::Relaxed),
            "stopping pipeline"
        );
        self.core.should_stop.store(true, Ordering::Relaxed);

        // workers first; draining is not required, in-flight events may
        // drop without commit
        let procs: Vec<ProcHandle> = self.procs.lock().drain(..).collect();
        for proc in &procs {
            proc.stop.store(true, Ordering::Relaxed);
        }
        self.core.streamer.stop();
        for proc in procs {
            let _ = proc.join.join();
        }

        if let Some(input) = self.core.input.get() {
            input.stop();
        }
        if let Some(output) = self.core.output.get() {
            output.stop();
        }
    }

    fn spawn_proc(&self, id: usize) {
        let output = self
            .core
            .output
            .get()
            .expect("processors spawn after the output is wired")
            .clone();
        let controller: Arc<dyn ActionController> = self.core.clone();

        let infos = self.action_infos.lock().clone();
        let mut actions = Vec::with_capacity(infos.len());
        for (index, info) in infos.iter().enumerate() {
            let mut plugin = (info.factory)();
            plugin.start(&ActionPluginParams {
                defaults: self.default_params(),
                controller: Arc::clone(&controller),
                index,
            });
            actions.push(ActionUnit {
                name: info.name.clone(),
                plugin,
            });
        }

        let stop = Arc::new(AtomicBool::new(false));
        let proc = Processor::new(id, Arc::clone(&self.core), output, actions, Arc::clone(&stop));
        let join = thread::Builder::new()
            .name(format!("{}-proc-{id}", self.core.name))
            .spawn(move || proc.run())
            .expect("failed to spawn processor thread");

        self.procs.lock().push(ProcHandle { stop, join });
    }

    /// Double the worker fleet. Growth is monotonic; there is no shrink
    /// path, because steady-state pipelines benefit from stable stream
    /// affinity.
    pub(crate) fn expand_procs(&self) {
        if self.single_proc.load(Ordering::Relaxed) {
            return;
        }

        let from = self.core.proc_count.load(Ordering::Relaxed);
        let to = from * 2;
        tracing::info!(pipeline = %self.core.name, from, to, "processors count expanded");
        if to > MAX_PROCS_SOFT_CAP {
            tracing::warn!(pipeline = %self.core.name, procs = to, "too many processors");
        }

        for id in from.max(0) as usize..to.max(0) as usize {
            self.spawn_proc(id);
        }
        self.core.proc_count.store(to, Ordering::SeqCst);
    }

    /// Supervisor loop: when the whole fleet stays busy for a full poll
    /// interval, the workload saturates it - double the fleet.
    fn run_grow_procs(self: Arc<Self>) {
        let interval = GROW_PROCS_INTERVAL;
        let mut saturated_since = Instant::now();
        loop {
            thread::sleep(interval);
            if self.core.should_stop.load(Ordering::Relaxed) {
                return;
            }
            if self.core.proc_count.load(Ordering::Relaxed)
                != self.core.active_procs.load(Ordering::Relaxed)
            {
                saturated_since = Instant::now();
            }
            if saturated_since.elapsed() > interval {
                self.expand_procs();
            }
        }
    }

    fn run_maintenance(self: Arc<Self>) {
        let interval = self.core.settings.maintenance_interval;
        let mut last_committed = 0u64;
        let mut last_size = 0u64;

        loop {
            thread::sleep(interval);
            if self.core.should_stop.load(Ordering::Relaxed) {
                return;
            }

            self.core.antispam.maintenance();
            self.core.metrics.maintenance();

            let total_committed = self.core.total_committed.load(Ordering::Relaxed);
            let total_size = self.core.total_size.load(Ordering::Relaxed);
            let delta_committed = total_committed.saturating_sub(last_committed);
            let delta_size = total_size.saturating_sub(last_size);
            let secs = interval.as_secs_f64().max(f64::EPSILON);
            let rate = (delta_committed as f64 / secs) as u64;
            let rate_mb = delta_size as f64 / secs / 1024.0 / 1024.0;
            let avg_size = if total_committed == 0 {
                0
            } else {
                total_size / total_committed
            };

            tracing::info!(
                pipeline = %self.core.name,
                interval_s = interval.as_secs(),
                active_procs = self.core.active_procs.load(Ordering::Relaxed),
                procs = self.core.proc_count.load(Ordering::Relaxed),
                queue_used = self.core.pool.in_use(),
                capacity = self.core.pool.capacity(),
                out = delta_committed,
                rate,
                rate_mb = format!("{rate_mb:.1}"),
                total = total_committed,
                total_mb = format!("{:.1}", total_size as f64 / 1024.0 / 1024.0),
                avg_size,
                max_size = self.core.max_size.load(Ordering::Relaxed),
                "pipeline stats"
            );

            last_committed = total_committed;
            last_size = total_size;

            // flush and re-arm the samples so each window logs a fresh one
            if let Some(sample) = self.core.in_sample.lock().take() {
                tracing::info!(pipeline = %self.core.name, sample, "input event sample");
                self.core.in_sample_taken.store(false, Ordering::Relaxed);
            }
            if let Some(sample) = self.core.out_sample.lock().take() {
                tracing::info!(pipeline = %self.core.name, sample, "output event sample");
                self.core.out_sample_taken.store(false, Ordering::Relaxed);
            }
        }
    }

    // Debug surface

    /// Total events committed to the input so far.
    pub fn events_total(&self) -> u64 {
        self.core.total_committed.load(Ordering::Relaxed)
    }

    /// Keep an in-memory copy of every committed document; test tooling.
    pub fn enable_event_log(&self) {
        self.core.event_log_enabled.store(true, Ordering::Relaxed);
    }

    pub fn event_log_item(&self, index: usize) -> Option<String> {
        self.core.event_log.lock().get(index).cloned()
    }

    // Admin surface

    pub fn action_count(&self) -> usize {
        self.action_infos.lock().len()
    }

    /// Stream registry and pool dumps for the status page.
    pub fn status_dump(&self) -> String {
        let mut out = format!("pipeline {}\n", self.core.name);
        out.push_str(&self.core.streamer.dump());
        out.push_str(&self.core.pool.dump());
        out
    }

    /// Current-window metric values for the action at `index`.
    pub fn action_metric_values(&self, index: usize) -> Result<Vec<StatusCount>> {
        if index >= self.action_count() {
            return Err(PipelineError::UnknownAction(index));
        }
        match self.core.metrics.action_values(index) {
            Some(values) => Ok(values
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect()),
            None => Err(PipelineError::MetricNotConfigured(index)),
        }
    }

    /// Before/after snapshot of the next event passing the action at
    /// `index`, from whichever worker gets there first.
    pub fn action_sample(&self, index: usize, timeout: Duration) -> Result<Sample> {
        if index >= self.action_count() {
            return Err(PipelineError::UnknownAction(index));
        }
        if self.core.active_procs.load(Ordering::Relaxed) <= 0
            || self.core.proc_count.load(Ordering::Relaxed) <= 0
        {
            return Err(PipelineError::NoActiveProcessors);
        }
        self.core.samples.request(index, timeout)
    }

    /// Plugin-registered endpoint under an admin index: 0 is the input,
    /// `1..=actions` the actions, `actions + 1` the output.
    pub fn endpoint(&self, index: usize, name: &str) -> Option<EndpointFn> {
        let find = |endpoints: &[(String, EndpointFn)]| {
            endpoints
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, f)| Arc::clone(f))
        };

        let action_count = self.action_count();
        if index == 0 {
            return self.input_info.lock().as_ref().and_then(|i| find(&i.endpoints));
        }
        if index == action_count + 1 {
            return self.output_info.lock().as_ref().and_then(|i| find(&i.endpoints));
        }
        let infos = self.action_infos.lock();
        infos.get(index.checked_sub(1)?).and_then(|i| find(&i.endpoints))
    }

}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
