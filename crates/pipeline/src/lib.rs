//! Lumber - Pipeline
//!
//! The event plane of one log-ingestion pipeline: the bounded event pool,
//! the per-`(source, stream)` ordering registry, the dynamic worker fleet
//! running the action chain, the output batcher, and the antispam and
//! maintenance machinery that keeps a pipeline healthy under load.
//!
//! # Architecture
//!
//! ```text
//! [Input plugin]                                        [Output plugin]
//!     │ ingest(bytes)                                        ▲ out(event)
//!     ▼                                                      │
//!  antispam ─→ event pool ─→ decode ─→ stream registry ─→ workers ─→ actions
//!     ▲            ▲                        (FIFO per          │
//!     │            └───────── back ◀── commit ◀── batcher ◀────┘
//!     └── maintenance tick (decay, metrics rotation, stats line)
//! ```
//!
//! # Key Design
//!
//! - **Bounded memory**: at most `capacity` events exist; `get()` blocks
//!   when the pool drains, back-pressuring the input's read loop
//! - **Ordering**: events sharing `(SourceId, StreamName)` flow through
//!   actions and to the output in strict intake order; nothing else orders
//! - **Single ownership**: events move as `Box<Event>` from pool to stream
//!   queue to worker to output to finalize, one holder at a time
//! - **Dynamic fleet**: a supervisor doubles the worker count whenever the
//!   fleet stays saturated; it never shrinks
//! - **At-least-once**: the batcher retries a failing flush forever and
//!   commits every event of a batch only after the flush succeeds

mod antispam;
mod batcher;
mod error;
mod event;
mod metrics;
mod pipeline;
mod plugin;
mod pool;
mod processor;
mod sample;
mod stream;
mod streamer;

pub use batcher::{Batch, BatchFlusher, Batcher, BatcherOptions};
pub use error::{PipelineError, Result};
pub use event::{Event, EventKind, SourceId, StreamName};
pub use metrics::{STATUS_DISCARDED, STATUS_PASSED, STATUS_RECEIVED};
pub use pipeline::{Pipeline, Settings, StatusCount};
pub use plugin::{
    ActionController, ActionFactory, ActionInfo, ActionPlugin, ActionPluginParams, ActionResult,
    EndpointFn, InputController, InputPlugin, InputPluginInfo, InputPluginParams, OutputController,
    OutputPlugin, OutputPluginInfo, OutputPluginParams, PluginDefaultParams, PluginEndpoints,
};
pub use sample::Sample;

use std::time::Duration;

/// Default document field whose string value names the stream
pub const DEFAULT_STREAM_FIELD: &str = "stream";

/// Default event pool capacity (back-pressure width)
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default average log size hint for batcher buffer sizing
pub const DEFAULT_AVG_LOG_SIZE: usize = 16 * 1024;

/// Default tick of antispam decay, metrics rotation, and the stats line
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5);

/// Stream name given to events whose stream field is absent or empty
pub const DEFAULT_STREAM_NAME: &str = "not_set";

/// Divisor applied to every antispam counter per maintenance tick
pub(crate) const ANTISPAM_UNBAN_ITERATIONS: u64 = 4;

/// Rotation period of the per-action metric windows
pub(crate) const METRICS_GEN_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Poll interval of the worker-growth supervisor
pub(crate) const GROW_PROCS_INTERVAL: Duration = Duration::from_millis(100);

/// Soft cap on the worker fleet; crossing it warns but does not abort
pub(crate) const MAX_PROCS_SOFT_CAP: i32 = 10_000;

/// Time bound on the admin sample endpoint
pub const SAMPLE_TIMEOUT: Duration = Duration::from_secs(5);
