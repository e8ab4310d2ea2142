mod script;
mod shell;
mod slurm;

pub use script::{shell_quote, BatchScriptRenderer};
pub use shell::ShellScheduler;
pub use slurm::SlurmScheduler;

use sluice_core::config::SchedulerKind;
use sluice_core::scheduler::Scheduler;
use std::path::Path;

/// Builds the adapter for a configured scheduler kind. Both adapters
/// keep their scripts under the project's scripts directory.
pub fn scheduler_for(kind: SchedulerKind, scripts_dir: &Path) -> Box<dyn Scheduler> {
    match kind {
        SchedulerKind::Slurm => Box::new(SlurmScheduler::new(scripts_dir)),
        SchedulerKind::Shell => Box::new(ShellScheduler::new(scripts_dir)),
    }
}
