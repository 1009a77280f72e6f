//! Lumber - Plugins
//!
//! Concrete plugins for the pipeline's three seams:
//!
//! - `input::fake` - synthetic input driven programmatically; the test
//!   and load harness
//! - `output::devnull` - commits everything immediately, optionally
//!   handing each event to a callback
//! - `output::file` - batched newline-delimited writer with timed
//!   seal-up rotation
//! - `action::discard` - drops every event it sees
//! - `action::modify` - sets configured fields on every document

pub mod action;
pub mod input;
pub mod output;
