pub mod run_log;
pub mod scheduler;

pub use run_log::{RunLog, RunLogEntry, RunStatus};
pub use scheduler::{CheckScheduler, SchedulerTiming};
