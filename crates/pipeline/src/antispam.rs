//! Antispam filter - per-source intake throttle
//!
//! Every `ingest` bumps a per-source counter; once a source exceeds the
//! threshold within one maintenance window, further records from it are
//! rejected at intake. The ban is soft: each maintenance tick divides
//! every counter by `ANTISPAM_UNBAN_ITERATIONS`, so a source that goes
//! quiet decays back below the threshold and re-enables itself.
//!
//! A threshold of zero disables the filter entirely.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::event::SourceId;
use crate::ANTISPAM_UNBAN_ITERATIONS;

pub(crate) struct Antispamer {
    threshold: u64,
    sources: RwLock<HashMap<SourceId, AtomicU64>>,
}

impl Antispamer {
    pub(crate) fn new(threshold: u64) -> Self {
        Self {
            threshold,
            sources: RwLock::new(HashMap::new()),
        }
    }

    #[inline]
    pub(crate) fn is_enabled(&self) -> bool {
        self.threshold > 0
    }

    /// Count one record from `source_id`; true means reject it.
    ///
    /// A re-registered source (`is_new_source`) starts from a clean
    /// counter: the old process incarnation's burst is not its fault.
    pub(crate) fn is_spam(&self, source_id: SourceId, source_name: &str, is_new_source: bool) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let sources = self.sources.read();
        let value = match sources.get(&source_id) {
            Some(counter) => {
                if is_new_source {
                    counter.store(0, Ordering::Relaxed);
                }
                counter.fetch_add(1, Ordering::Relaxed) + 1
            }
            None => {
                drop(sources);
                let mut sources = self.sources.write();
                sources
                    .entry(source_id)
                    .or_insert_with(|| AtomicU64::new(0))
                    .fetch_add(1, Ordering::Relaxed)
                    + 1
            }
        };

        if value == self.threshold + 1 {
            tracing::warn!(
                %source_id,
                source_name,
                threshold = self.threshold,
                "source is banned as spammy"
            );
        }

        value > self.threshold
    }

    /// Decay every counter; drops sources that reached zero.
    pub(crate) fn maintenance(&self) {
        let mut sources = self.sources.write();
        sources.retain(|source_id, counter| {
            let old = counter.load(Ordering::Relaxed);
            let new = old / ANTISPAM_UNBAN_ITERATIONS;
            counter.store(new, Ordering::Relaxed);

            if old > self.threshold && new <= self.threshold {
                tracing::info!(%source_id, "source is unbanned");
            }
            new > 0
        });
    }

    #[cfg(test)]
    pub(crate) fn source_count(&self) -> usize {
        self.sources.read().len()
    }
}

#[cfg(test)]
#[path = "antispam_test.rs"]
mod tests;
