//! CLI command handlers.

mod plan;
mod run;
mod stats;

pub use plan::run_plan_command;
pub use run::run_batch_command;
pub use stats::run_stats_command;
