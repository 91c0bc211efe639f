pub mod output;
pub mod progress;

pub use output::{OutputFormatter, OutputMode};
pub use progress::{JobProgress, ProgressManager};
