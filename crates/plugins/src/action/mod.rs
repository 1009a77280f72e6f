//! Action plugins

mod discard;
mod modify;

pub use discard::DiscardAction;
pub use modify::ModifyAction;
