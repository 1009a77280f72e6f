//! Per-action event metrics
//!
//! Each action with a configured metric name gets a pair of counter
//! windows, keyed by event status. Counters use relaxed atomics; values
//! are eventually consistent, not real-time.
//!
//! The window pair bounds cardinality growth: every `METRICS_GEN_INTERVAL`
//! the current window rotates into `previous` and starts fresh, so a label
//! that stops occurring ages out after one rotation. Readers (the admin
//! surface) always see `current`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

/// Status recorded before an action runs
pub const STATUS_RECEIVED: &str = "received";

/// Status recorded when an action discards the event
pub const STATUS_DISCARDED: &str = "discarded";

/// Status recorded when an action passes the event on
pub const STATUS_PASSED: &str = "passed";

/// The statuses every action report includes, in display order.
pub(crate) const WELL_KNOWN_STATUSES: [&str; 3] =
    [STATUS_RECEIVED, STATUS_DISCARDED, STATUS_PASSED];

pub(crate) struct MetricsHolder {
    gen_interval: Duration,

    /// One slot per action, in configuration order; `None` when the
    /// action has no metric name configured
    actions: RwLock<Vec<Option<ActionMetrics>>>,

    next_rotation: Mutex<Instant>,
}

struct ActionMetrics {
    name: String,
    windows: RwLock<WindowPair>,
}

#[derive(Default)]
struct WindowPair {
    current: HashMap<String, AtomicU64>,
    previous: HashMap<String, AtomicU64>,
}

impl ActionMetrics {
    fn count(&self, status: &str) {
        {
            let windows = self.windows.read();
            if let Some(counter) = windows.current.get(status) {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        let mut windows = self.windows.write();
        windows
            .current
            .entry(status.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn rotate(&self) {
        let mut windows = self.windows.write();
        windows.previous = std::mem::take(&mut windows.current);
    }

    fn value(&self, status: &str) -> u64 {
        self.windows
            .read()
            .current
            .get(status)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

impl MetricsHolder {
    pub(crate) fn new(gen_interval: Duration) -> Self {
        Self {
            gen_interval,
            actions: RwLock::new(Vec::new()),
            next_rotation: Mutex::new(Instant::now() + gen_interval),
        }
    }

    /// Register the metric slot for the next action in configuration order.
    pub(crate) fn add_action(&self, metric_name: Option<String>) {
        self.actions.write().push(metric_name.map(|name| ActionMetrics {
            name,
            windows: RwLock::new(WindowPair::default()),
        }));
    }

    /// Bump `status` for the action at `index`; no-op without a metric.
    #[inline]
    pub(crate) fn count_event(&self, index: usize, status: &str) {
        let actions = self.actions.read();
        if let Some(Some(metrics)) = actions.get(index) {
            metrics.count(status);
        }
    }

    /// Rotate windows when the generation interval has elapsed.
    pub(crate) fn maintenance(&self) {
        let now = Instant::now();
        {
            let mut next = self.next_rotation.lock();
            if now < *next {
                return;
            }
            *next = now + self.gen_interval;
        }

        let actions = self.actions.read();
        for metrics in actions.iter().flatten() {
            metrics.rotate();
            tracing::debug!(metric = %metrics.name, "action metric window rotated");
        }
    }

    /// Current-window values for the action, well-known statuses first.
    pub(crate) fn action_values(&self, index: usize) -> Option<Vec<(String, u64)>> {
        let actions = self.actions.read();
        let metrics = actions.get(index)?.as_ref()?;

        let mut values: Vec<(String, u64)> = WELL_KNOWN_STATUSES
            .iter()
            .map(|status| (status.to_string(), metrics.value(status)))
            .collect();

        let windows = metrics.windows.read();
        let mut extra: Vec<_> = windows
            .current
            .iter()
            .filter(|(status, _)| !WELL_KNOWN_STATUSES.contains(&status.as_str()))
            .map(|(status, counter)| (status.clone(), counter.load(Ordering::Relaxed)))
            .collect();
        extra.sort();
        values.extend(extra);

        Some(values)
    }
}

#[cfg(test)]
#[path = "metrics_test.rs"]
mod tests;
