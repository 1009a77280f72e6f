//! Event - the unit of work flowing through a pipeline
//!
//! One event carries one decoded log record: the mutable document tree,
//! the producer identity, the producer-chosen offset, and the routing
//! tags the stream registry orders by.
//!
//! Events are pooled. They move as `Box<Event>` so exactly one subsystem
//! owns an event at any moment: the pool, a stream queue, a worker, an
//! action holding it, or a batch. Finalization hands the box back to the
//! pool, where it is reset and reused rather than reallocated.

use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;

use serde_json::Value;

use crate::stream::Stream;
use crate::DEFAULT_STREAM_NAME;

/// Opaque 64-bit producer identity assigned by the input plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source:{}", self.0)
    }
}

/// Routing tag naming one ordered stream within a source.
///
/// Cheap to clone and to use as a registry key; the default name is
/// shared process-wide.
pub type StreamName = Arc<str>;

/// The shared `"not_set"` stream name.
pub(crate) fn default_stream_name() -> StreamName {
    static DEFAULT: OnceLock<StreamName> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::from(DEFAULT_STREAM_NAME)).clone()
}

/// What kind of event this is.
///
/// `Timeout` events are synthetic flush nudges: they travel the action
/// chain like any event but finalization ignores them because they were
/// never checked out of the pool. `Unlocked` marks shutdown wake markers;
/// workers drop them on sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventKind {
    #[default]
    Normal,
    Timeout,
    Unlocked,
}

/// One log record inside the pipeline.
pub struct Event {
    /// Parsed document tree; whoever holds the event may mutate it
    pub root: Value,

    /// Producer identity (may be rewritten in spread mode)
    pub source_id: SourceId,

    /// Printable producer name
    pub source_name: String,

    /// Producer-chosen monotone position, persisted on commit
    pub offset: i64,

    /// Raw byte length of the record at intake
    pub size: usize,

    /// Immutable sequence id assigned at pool checkout
    pub(crate) seq_id: u64,

    /// Routing tag; `"not_set"` unless the stream field says otherwise
    pub(crate) stream_name: StreamName,

    /// Back-tag to the stream this event was queued on; lookup only,
    /// the event never frees a stream
    pub(crate) stream: Option<Arc<Stream>>,

    pub(crate) kind: EventKind,

    /// Cursor of the action chain executor
    pub(crate) action_index: usize,
}

impl Event {
    pub(crate) fn empty() -> Self {
        Self {
            root: Value::Null,
            source_id: SourceId(0),
            source_name: String::new(),
            offset: 0,
            size: 0,
            seq_id: 0,
            stream_name: default_stream_name(),
            stream: None,
            kind: EventKind::Normal,
            action_index: 0,
        }
    }

    /// Build a synthetic event that bypasses the pool.
    ///
    /// Timeout nudges travel the action chain like any event but are
    /// ignored by finalization, since they were never checked out.
    pub fn synthetic(kind: EventKind) -> Box<Self> {
        let mut event = Box::new(Self::empty());
        event.kind = kind;
        event
    }

    /// Sequence id assigned at intake; 0 means the event never entered.
    #[inline]
    pub fn seq_id(&self) -> u64 {
        self.seq_id
    }

    /// Stream this event is ordered on.
    #[inline]
    pub fn stream_name(&self) -> &StreamName {
        &self.stream_name
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[inline]
    pub fn is_timeout_kind(&self) -> bool {
        self.kind == EventKind::Timeout
    }

    /// Serialize the document into `buf`, reusing its allocation.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        // writing JSON into a Vec cannot fail
        let _ = serde_json::to_writer(&mut *buf, &self.root);
    }

    /// Serialize the document to a fresh string.
    pub fn encode_to_string(&self) -> String {
        serde_json::to_string(&self.root).unwrap_or_default()
    }

    /// Wipe the event for reuse, keeping the buffers it owns.
    pub(crate) fn reset(&mut self) {
        self.root = Value::Null;
        self.source_id = SourceId(0);
        self.source_name.clear();
        self.offset = 0;
        self.size = 0;
        self.seq_id = 0;
        self.stream_name = default_stream_name();
        self.stream = None;
        self.kind = EventKind::Normal;
        self.action_index = 0;
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("seq_id", &self.seq_id)
            .field("source_id", &self.source_id)
            .field("offset", &self.offset)
            .field("stream", &self.stream_name)
            .field("kind", &self.kind)
            .finish()
    }
}
