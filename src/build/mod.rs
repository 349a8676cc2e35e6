mod cachebust;
mod clean;
mod core;
mod scripts;
mod styles;
mod watcher;

pub use cachebust::{CacheToken, stamp};
pub use clean::clean;
pub use core::{Artifact, Phase, Pipeline, RunSummary, print_summary};
pub use scripts::build_scripts;
pub use styles::build_styles;
pub use watcher::{Batch, WatchPlan, watch};
