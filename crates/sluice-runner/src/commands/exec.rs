use crate::cli::ExecArgs;
use crate::commands::{self, AppContext};
use crate::error::CliError;
use colored::Colorize;
use sluice_core::model::OpName;
use sluice_core::store::JobStore;

/// Runs one operation's command for the given jobs with no condition checks
/// at all. This is the escape hatch for reruns and debugging; records and
/// statuses are left untouched.
pub fn handle_exec(args: ExecArgs, ctx: &AppContext) -> Result<(), CliError> {
    let op = ctx
        .graph
        .get(&OpName(args.operation.clone()))
        .ok_or_else(|| commands::unknown_operation(ctx, &args.operation))?;
    let store = ctx.store()?;
    let jobs = commands::resolve_jobs(&store, &args.jobs)?;
    if jobs.is_empty() {
        println!("- No jobs in the workspace.");
        return Ok(());
    }

    let mut failed = 0usize;
    for job in &jobs {
        let workspace = store.workspace(job)?;
        let command = op.command_for(job, &workspace);
        println!(
            "  {} {}/{} ({})",
            "::".cyan(),
            op.name,
            job.short_id(),
            command.dimmed()
        );
        match commands::run_command(&command, &workspace) {
            Ok(status) if status.success() => {
                println!("  {} {}", "OK".green().bold(), job.short_id().dimmed());
            }
            Ok(status) => {
                failed += 1;
                println!(
                    "  {} {} (exit {})",
                    "FAIL".red().bold(),
                    job.short_id(),
                    status.code().unwrap_or(-1)
                );
            }
            Err(e) => {
                failed += 1;
                println!("  {} {}: {}", "FAIL".red().bold(), job.short_id(), e);
            }
        }
    }

    if failed == 0 {
        println!("- Ran '{}' for {} job(s).", op.name, jobs.len());
    } else {
        println!(
            "- {} of {} invocation(s) failed.",
            failed.to_string().red().bold(),
            jobs.len()
        );
    }
    Ok(())
}
