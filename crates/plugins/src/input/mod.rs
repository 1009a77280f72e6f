//! Input plugins

mod fake;

pub use fake::FakeInput;
