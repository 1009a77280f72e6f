//! Discard action - drop every event
//!
//! Terminates the chain for everything it sees. Offsets still commit, so
//! the input keeps advancing; pair it with match conditions in the
//! embedding configuration to drop a selected slice of traffic.

use std::sync::Arc;

use lumber_pipeline::{ActionFactory, ActionPlugin, ActionResult, Event};

pub struct DiscardAction;

impl DiscardAction {
    pub fn factory() -> ActionFactory {
        Arc::new(|| Box::new(DiscardAction))
    }
}

impl ActionPlugin for DiscardAction {
    fn handle(&mut self, event: Box<Event>) -> ActionResult {
        ActionResult::Discard(event)
    }
}
