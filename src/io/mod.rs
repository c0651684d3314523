//! Telemetry export for simulation runs.

pub mod csv;
pub mod json;

pub use self::csv::{write_trajectory, write_trajectory_file};
pub use self::json::{write_summary, write_summary_file, RunSummary};
