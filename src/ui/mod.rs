//! Terminal presentation for the cadence coordinator.

mod icons;
mod progress;

pub use progress::{PipelineUI, print_status_report};
