use crate::cli::ScriptArgs;
use crate::commands::{self, AppContext};
use crate::error::CliError;
use colored::Colorize;
use sluice_core::coordinator::{self, PassOptions};
use sluice_core::report::RenderedScript;
use sluice_sched::BatchScriptRenderer;

/// Renders the scripts a submit pass would generate right now and prints
/// them instead of submitting. Nothing is recorded.
pub fn handle_script(args: ScriptArgs, ctx: &AppContext) -> Result<(), CliError> {
    let filter = commands::op_filter(ctx, &args.operations)?;
    let store = ctx.store()?;
    let scheduler = ctx.scheduler();
    let mut records = ctx.records()?;

    let opts = PassOptions {
        bundle_size: args.bundle_size.unwrap_or(ctx.config.bundle_size),
        parallel_ops: ctx.config.parallel_ops,
        pretend: true,
        label_prefix: ctx.config.name.clone(),
        op_filter: filter,
        ..PassOptions::default()
    };
    let report = coordinator::run_pass(
        &store,
        &ctx.graph,
        scheduler.as_ref(),
        &BatchScriptRenderer,
        &mut records,
        &opts,
    )?;
    commands::warn_degraded(report.degraded.as_deref());

    if report.scripts.is_empty() {
        println!("- Nothing eligible to submit.");
        return Ok(());
    }
    for script in &report.scripts {
        print_script(script);
    }
    Ok(())
}

pub(crate) fn print_script(script: &RenderedScript) {
    println!(
        "{}",
        format!(
            "# ---- bundle {} ({} pair(s)) ----",
            script.label,
            script.pairs.len()
        )
        .dimmed()
    );
    print!("{}", script.text);
    println!();
}
