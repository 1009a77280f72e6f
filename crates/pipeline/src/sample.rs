//! Sample capture - before/after snapshots for the admin surface
//!
//! One admin request parks a rendezvous slot naming an action index.
//! Every worker checks the slot (a relaxed atomic, so the hot path pays
//! one load when nobody is asking), snapshots the document before and
//! after that action, and publishes the pair; the first publish wins.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::error::PipelineError;

/// A before/after pair snapshotted around one action.
///
/// `after` is `None` when the action discarded or held the event.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub before: Value,
    pub after: Option<Value>,
}

pub(crate) struct SampleHub {
    /// Action index a request is outstanding for; -1 means none
    requested: AtomicI64,

    slot: Mutex<Option<Sender<Sample>>>,
}

impl SampleHub {
    pub(crate) fn new() -> Self {
        Self {
            requested: AtomicI64::new(-1),
            slot: Mutex::new(None),
        }
    }

    /// Hot-path check: is someone asking for a sample of this action?
    #[inline]
    pub(crate) fn wants(&self, action_index: usize) -> bool {
        self.requested.load(Ordering::Relaxed) == action_index as i64
    }

    /// Offer a snapshot pair; the first worker to land one wins.
    pub(crate) fn publish(&self, action_index: usize, before: Value, after: Option<Value>) {
        if !self.wants(action_index) {
            return;
        }
        let slot = self.slot.lock();
        if let Some(sender) = slot.as_ref() {
            if sender.try_send(Sample { before, after }).is_ok() {
                self.requested.store(-1, Ordering::Relaxed);
            }
        }
    }

    /// Park a request for `action_index` and wait for the first snapshot.
    pub(crate) fn request(
        &self,
        action_index: usize,
        timeout: Duration,
    ) -> Result<Sample, PipelineError> {
        let (sender, receiver) = bounded(1);
        {
            let mut slot = self.slot.lock();
            if slot.is_some() {
                return Err(PipelineError::SampleBusy);
            }
            *slot = Some(sender);
        }
        self.requested.store(action_index as i64, Ordering::Relaxed);

        let result = receiver.recv_timeout(timeout);

        self.requested.store(-1, Ordering::Relaxed);
        self.slot.lock().take();

        result.map_err(|_| PipelineError::SampleTimeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_idle_hub_wants_nothing() {
        let hub = SampleHub::new();
        assert!(!hub.wants(0));

        // publishing without a request is a no-op
        hub.publish(0, json!({}), None);
    }

    #[test]
    fn test_first_publish_wins() {
        let hub = std::sync::Arc::new(SampleHub::new());

        let request = {
            let hub = std::sync::Arc::clone(&hub);
            std::thread::spawn(move || hub.request(2, Duration::from_secs(1)))
        };

        // wait until the request is parked
        while !hub.wants(2) {
            std::thread::yield_now();
        }

        hub.publish(2, json!({"v": 1}), Some(json!({"v": 2})));
        hub.publish(2, json!({"v": 3}), None);

        let sample = request.join().unwrap().unwrap();
        assert_eq!(sample.before, json!({"v": 1}));
        assert_eq!(sample.after, Some(json!({"v": 2})));
    }

    #[test]
    fn test_request_times_out_without_traffic() {
        let hub = SampleHub::new();
        let err = hub.request(0, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, PipelineError::SampleTimeout));
        assert!(!hub.wants(0));
    }

    #[test]
    fn test_wrong_index_is_ignored() {
        let hub = std::sync::Arc::new(SampleHub::new());

        let request = {
            let hub = std::sync::Arc::clone(&hub);
            std::thread::spawn(move || hub.request(1, Duration::from_millis(50)))
        };

        while !hub.wants(1) {
            std::thread::yield_now();
        }
        hub.publish(0, json!({}), None);

        assert!(request.join().unwrap().is_err());
    }
}
