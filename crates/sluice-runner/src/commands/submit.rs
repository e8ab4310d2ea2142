use crate::cli::SubmitArgs;
use crate::commands::{self, script, AppContext};
use crate::error::CliError;
use colored::Colorize;
use sluice_core::coordinator::{self, PassOptions};
use sluice_sched::BatchScriptRenderer;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub fn handle_submit(args: SubmitArgs, ctx: &AppContext) -> Result<(), CliError> {
    let filter = commands::op_filter(ctx, &args.operations)?;
    let store = ctx.store()?;
    let job_filter = if args.jobs.is_empty() {
        None
    } else {
        Some(
            commands::resolve_jobs(&store, &args.jobs)?
                .into_iter()
                .collect::<BTreeSet<_>>(),
        )
    };
    let scheduler = ctx.scheduler();
    let mut records = ctx.records()?;

    // Ctrl-C stops the pass between bundles; a bundle that already went out
    // stays recorded.
    let abort = Arc::new(AtomicBool::new(false));
    let flag = abort.clone();
    let _ = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    });

    let opts = PassOptions {
        bundle_size: args.bundle_size.unwrap_or(ctx.config.bundle_size),
        parallel_ops: args.parallel_ops || ctx.config.parallel_ops,
        num: args.num,
        pretend: args.pretend,
        label_prefix: ctx.config.name.clone(),
        op_filter: filter,
        job_filter,
        abort: Some(abort),
        ..PassOptions::default()
    };

    println!(
        "- Submitting through the '{}' scheduler...",
        scheduler.name().cyan()
    );
    let spinner = commands::reconcile_spinner("Reconciling and submitting...");
    let report = coordinator::run_pass(
        &store,
        &ctx.graph,
        scheduler.as_ref(),
        &BatchScriptRenderer,
        &mut records,
        &opts,
    )?;
    spinner.finish_and_clear();

    commands::warn_degraded(report.degraded.as_deref());

    if args.pretend {
        for rendered in &report.scripts {
            script::print_script(rendered);
        }
        println!(
            "- Pretend pass: {} bundle(s) rendered, nothing submitted.",
            report.scripts.len()
        );
        return Ok(());
    }

    let total = report.submitted.len();
    for (i, bundle) in report.submitted.iter().enumerate() {
        println!(
            "  [{}/{}] {} bundle '{}' as {} ({} pair(s))",
            i + 1,
            total,
            "Submitted".green(),
            bundle.label,
            bundle.scheduler_id.to_string().bold(),
            bundle.pairs.len()
        );
        for pair in &bundle.pairs {
            println!("        - {}", pair.to_string().dimmed());
        }
    }

    let mut failures = 0usize;
    for outcome in report.errors() {
        if let Some(error) = &outcome.error {
            failures += 1;
            eprintln!("{}", format!("[ERROR] {}", error).red());
        }
    }

    if !report.pruned.is_empty() {
        println!(
            "- Pruned {} stale submission record(s).",
            report.pruned.len()
        );
    }
    if report.aborted {
        println!(
            "{}",
            "- Interrupted; remaining bundles were not submitted.".yellow()
        );
    }
    if report.submitted.is_empty() && failures == 0 {
        println!("- Nothing eligible to submit.");
    } else {
        println!(
            "- Submitted {} bundle(s) covering {} pair(s).",
            total.to_string().bold(),
            report.submitted_pairs()
        );
    }
    Ok(())
}
