use crate::cli::RunArgs;
use crate::commands::{self, AppContext};
use crate::error::CliError;
use colored::Colorize;
use sluice_core::coordinator::{self, PassOptions};
use sluice_core::store::JobStore;

/// Executes eligible operations directly in this process, one sweep in
/// deterministic order. The same predecessor-completion gate applies as for
/// submission; a failing operation is reported and the sweep moves on.
pub fn handle_run(args: RunArgs, ctx: &AppContext) -> Result<(), CliError> {
    let filter = commands::op_filter(ctx, &args.operations)?;
    let store = ctx.store()?;
    let scheduler = ctx.scheduler();
    let mut records = ctx.records()?;

    let spinner = commands::reconcile_spinner("Reconciling status...");
    let table = coordinator::fetch_status(&store, &ctx.graph, scheduler.as_ref(), &mut records)?;
    spinner.finish_and_clear();
    commands::warn_degraded(table.degraded.as_deref());

    let opts = PassOptions {
        op_filter: filter,
        num: args.num,
        ..PassOptions::default()
    };
    let pairs = coordinator::select_pairs(&table, &ctx.graph, &opts);
    if pairs.is_empty() {
        println!("- Nothing eligible to run.");
        return Ok(());
    }

    println!(
        "- Running {} operation(s) directly...",
        pairs.len().to_string().bold()
    );
    let mut failed = 0usize;
    for pair in &pairs {
        let Some(op) = ctx.graph.get(&pair.op) else {
            continue;
        };
        let workspace = match store.workspace(&pair.job) {
            Ok(workspace) => workspace,
            Err(e) => {
                failed += 1;
                println!("  {} {}: {}", "FAIL".red().bold(), pair, e);
                continue;
            }
        };
        let command = op.command_for(&pair.job, &workspace);
        println!("  {} {} ({})", "::".cyan(), pair, command.dimmed());
        match commands::run_command(&command, &workspace) {
            Ok(status) if status.success() => {
                println!("  {} {}", "OK".green().bold(), pair.to_string().dimmed());
            }
            Ok(status) => {
                failed += 1;
                println!(
                    "  {} {} (exit {})",
                    "FAIL".red().bold(),
                    pair,
                    status.code().unwrap_or(-1)
                );
            }
            Err(e) => {
                failed += 1;
                println!("  {} {}: {}", "FAIL".red().bold(), pair, e);
            }
        }
    }

    if failed == 0 {
        println!("- All {} operation(s) finished.", pairs.len());
    } else {
        println!(
            "- {} of {} operation(s) failed.",
            failed.to_string().red().bold(),
            pairs.len()
        );
    }
    Ok(())
}
