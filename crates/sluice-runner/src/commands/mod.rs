use crate::error::CliError;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sluice_core::config::{self, ProjectConfig, SchedulerKind, UserConfig};
use sluice_core::graph::OperationGraph;
use sluice_core::model::{JobId, OpName};
use sluice_core::records::RecordStore;
use sluice_core::scheduler::Scheduler;
use sluice_core::store::JobStore;
use sluice_store::FsJobStore;
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub mod add;
pub mod exec;
pub mod init;
pub mod next;
pub mod run;
pub mod script;
pub mod status;
pub mod submit;

/// Everything a project-scoped command needs, loaded once per invocation.
pub struct AppContext {
    pub config: ProjectConfig,
    pub graph: OperationGraph,
}

impl AppContext {
    pub fn open(project_arg: &Path, scheduler_override: Option<&str>) -> Result<Self, CliError> {
        let root = config::find_project_root(project_arg)?;
        let user = UserConfig::load()?;
        let mut config = ProjectConfig::load(&root, &user)?;
        if let Some(kind) = scheduler_override {
            config.scheduler = SchedulerKind::from_str(kind)?;
        }
        let graph = OperationGraph::build(config.operations.clone(), config.infer_dependencies)?;
        Ok(AppContext { config, graph })
    }

    /// Opens the workspace. `init` and `add` create it; everything else
    /// expects it to exist.
    pub fn store(&self) -> Result<FsJobStore, CliError> {
        Ok(FsJobStore::open(self.config.workspace_dir())?)
    }

    pub fn scheduler(&self) -> Box<dyn Scheduler> {
        sluice_sched::scheduler_for(self.config.scheduler, &self.config.scripts_dir())
    }

    pub fn records(&self) -> Result<RecordStore, CliError> {
        Ok(RecordStore::open(&self.config.state_dir)?)
    }
}

/// Resolves operation-name arguments into a selection filter. An empty
/// argument list means no filter.
pub(crate) fn op_filter(
    ctx: &AppContext,
    names: &[String],
) -> Result<Option<BTreeSet<OpName>>, CliError> {
    if names.is_empty() {
        return Ok(None);
    }
    let mut filter = BTreeSet::new();
    for name in names {
        let op = OpName(name.clone());
        if ctx.graph.get(&op).is_none() {
            return Err(unknown_operation(ctx, name));
        }
        filter.insert(op);
    }
    Ok(Some(filter))
}

pub(crate) fn unknown_operation(ctx: &AppContext, name: &str) -> CliError {
    let defined: Vec<&str> = ctx.graph.in_order().map(|op| op.name.0.as_str()).collect();
    CliError::UnknownOperation(name.to_string(), defined.join(", "))
}

/// Resolves job id arguments, accepting unambiguous prefixes. An empty
/// argument list resolves to every job in the workspace.
pub(crate) fn resolve_jobs(store: &FsJobStore, args: &[String]) -> Result<Vec<JobId>, CliError> {
    let all = store.jobs()?;
    if args.is_empty() {
        return Ok(all);
    }
    let mut resolved = Vec::new();
    for arg in args {
        let matches: Vec<&JobId> = all
            .iter()
            .filter(|job| job.0.starts_with(arg.as_str()))
            .collect();
        match matches.as_slice() {
            [] => return Err(CliError::NoSuchJob(arg.clone())),
            [job] => resolved.push((*job).clone()),
            many => {
                let shown = many
                    .iter()
                    .map(|job| job.short_id())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(CliError::AmbiguousJob {
                    prefix: arg.clone(),
                    matches: shown,
                });
            }
        }
    }
    Ok(resolved)
}

/// Runs an expanded operation command through `sh -c` in the job workspace,
/// inheriting stdout/stderr so the operation's own output stays visible.
pub(crate) fn run_command(
    command: &str,
    workspace: &Path,
) -> std::io::Result<std::process::ExitStatus> {
    let mut cmd = std::process::Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(workspace);
    sluice_core::logging::log_command(&cmd);
    cmd.status()
}

/// A steady-tick spinner for the reconciliation phase. Hidden automatically
/// when stderr is not a terminal; cleared before any tabular output.
pub(crate) fn reconcile_spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub(crate) fn warn_degraded(degraded: Option<&str>) {
    if let Some(reason) = degraded {
        eprintln!(
            "{}",
            format!(
                "[WARN] Scheduler unreachable ({}); recorded submissions are shown as queued.",
                reason
            )
            .yellow()
        );
    }
}
