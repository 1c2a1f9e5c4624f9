//! Terminal rendering helpers.

pub mod progress;

pub use progress::{task_label, ProgressView};
