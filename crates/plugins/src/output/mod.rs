//! Output plugins

mod devnull;
mod file;

pub use devnull::DevNullOutput;
pub use file::{FileOutput, FileOutputConfig};
