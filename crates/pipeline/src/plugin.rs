//! Plugin contracts - the seams between the event plane and the world
//!
//! Three plugin kinds exist. Inputs push raw records in and persist
//! offsets on commit. Actions transform one event at a time and decide
//! its fate. Outputs receive events that survived the chain and must
//! commit each one exactly once.
//!
//! Each plugin kind talks back to the pipeline through its own controller
//! trait, so a plugin sees exactly the surface it is allowed to touch.

use std::sync::Arc;

use lumber_decoder::DecoderKind;
use serde_json::Value;

use crate::event::{Event, SourceId};
use crate::pipeline::Settings;

/// Parameters common to every plugin kind.
#[derive(Clone)]
pub struct PluginDefaultParams {
    pub pipeline_name: String,
    pub settings: Arc<Settings>,
}

/// What an input plugin receives at `start`.
#[derive(Clone)]
pub struct InputPluginParams {
    pub defaults: PluginDefaultParams,
    pub controller: Arc<dyn InputController>,
}

/// What each per-worker action instance receives at `start`.
#[derive(Clone)]
pub struct ActionPluginParams {
    pub defaults: PluginDefaultParams,
    pub controller: Arc<dyn ActionController>,
    /// Position of this action in the chain
    pub index: usize,
}

/// What an output plugin receives at `start`.
#[derive(Clone)]
pub struct OutputPluginParams {
    pub defaults: PluginDefaultParams,
    pub controller: Arc<dyn OutputController>,
}

/// Controller surface exposed to input plugins.
pub trait InputController: Send + Sync {
    /// Push one raw record into the pipeline.
    ///
    /// Returns the event's sequence id, or 0 when the record was rejected
    /// (empty, spammy, or undecodable). Blocks when the event pool is
    /// drained - this is the back-pressure path into the read loop.
    /// The commit for this record arrives arbitrarily later via
    /// [`InputPlugin::commit`].
    fn ingest(
        &self,
        source_id: SourceId,
        source_name: &str,
        offset: i64,
        bytes: &[u8],
        is_new_source: bool,
    ) -> u64;

    /// Trade per-source FIFO for fleet-wide load balance.
    fn use_spread(&self);

    /// Skip reading the stream field; every event rides the default stream.
    fn disable_streams(&self);

    /// Suggest the decoder to use when the pipeline is configured `auto`.
    fn suggest_decoder(&self, kind: DecoderKind);
}

/// Controller surface exposed to action plugins, for events they hold.
pub trait ActionController: Send + Sync {
    /// Finalize a held event as successfully processed, skipping the rest
    /// of the chain.
    fn commit(&self, event: Box<Event>);

    /// Re-inject a held event; it resumes at the next action.
    fn propagate(&self, event: Box<Event>);
}

/// Controller surface exposed to output plugins.
pub trait OutputController: Send + Sync {
    /// Acknowledge one delivered event: the input persists its offset and
    /// the event returns to the pool.
    fn commit(&self, event: Box<Event>);

    /// Report an output-side error; fatal in strict mode, logged otherwise.
    fn error(&self, message: &str);
}

/// An input plugin: pulls records from somewhere and feeds `ingest`.
pub trait InputPlugin: Send + Sync {
    fn start(&self, params: InputPluginParams);

    fn stop(&self);

    /// Persist the offset of a processed event. Called once per event
    /// that entered through this input, arbitrarily later than `ingest`.
    fn commit(&self, event: &Event);
}

/// An output plugin: receives events that passed the whole chain.
pub trait OutputPlugin: Send + Sync {
    fn start(&self, params: OutputPluginParams);

    fn stop(&self);

    /// Take ownership of one event. The plugin must eventually call
    /// [`OutputController::commit`] with it exactly once.
    fn out(&self, event: Box<Event>);
}

/// What an action decides about one event.
pub enum ActionResult {
    /// Continue to the next action (or to the output after the last one)
    Pass(Box<Event>),

    /// Drop the event; its offset still commits
    Discard(Box<Event>),

    /// The action kept the event and will `commit` or `propagate` it
    /// later from some other thread
    Hold,
}

/// One action instance, private to one worker.
///
/// Instances are created per `(worker, position)` from the action's
/// factory, so implementations may keep mutable state without locking.
pub trait ActionPlugin: Send {
    fn start(&mut self, _params: &ActionPluginParams) {}

    fn stop(&mut self) {}

    /// Process one event and decide its fate.
    fn handle(&mut self, event: Box<Event>) -> ActionResult;
}

/// Builds one action instance per worker.
pub type ActionFactory = Arc<dyn Fn() -> Box<dyn ActionPlugin> + Send + Sync>;

/// A plugin-provided admin endpoint returning a JSON document.
pub type EndpointFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Extra admin endpoints a plugin mounts under its index.
pub type PluginEndpoints = Vec<(String, EndpointFn)>;

/// Static description of one configured action.
#[derive(Clone)]
pub struct ActionInfo {
    /// Plugin type name, for logs
    pub name: String,

    pub factory: ActionFactory,

    /// Metric to account this action's event statuses under; `None`
    /// disables accounting
    pub metric_name: Option<String>,

    pub endpoints: PluginEndpoints,
}

impl ActionInfo {
    pub fn new(name: impl Into<String>, factory: ActionFactory) -> Self {
        Self {
            name: name.into(),
            factory,
            metric_name: None,
            endpoints: Vec::new(),
        }
    }

    pub fn with_metric(mut self, metric_name: impl Into<String>) -> Self {
        self.metric_name = Some(metric_name.into());
        self
    }

    pub fn with_endpoint(mut self, name: impl Into<String>, endpoint: EndpointFn) -> Self {
        self.endpoints.push((name.into(), endpoint));
        self
    }
}

/// A wired input plugin plus its static description.
#[derive(Clone)]
pub struct InputPluginInfo {
    pub type_name: String,
    pub plugin: Arc<dyn InputPlugin>,
    pub endpoints: PluginEndpoints,
}

impl InputPluginInfo {
    pub fn new(type_name: impl Into<String>, plugin: Arc<dyn InputPlugin>) -> Self {
        Self {
            type_name: type_name.into(),
            plugin,
            endpoints: Vec::new(),
        }
    }
}

/// A wired output plugin plus its static description.
#[derive(Clone)]
pub struct OutputPluginInfo {
    pub type_name: String,
    pub plugin: Arc<dyn OutputPlugin>,
    pub endpoints: PluginEndpoints,
}

impl OutputPluginInfo {
    pub fn new(type_name: impl Into<String>, plugin: Arc<dyn OutputPlugin>) -> Self {
        Self {
            type_name: type_name.into(),
            plugin,
            endpoints: Vec::new(),
        }
    }
}
