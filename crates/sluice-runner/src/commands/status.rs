use crate::cli::StatusArgs;
use crate::commands::{self, AppContext};
use crate::error::CliError;
use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::{presets, Attribute, Cell, Color, Table};
use sluice_core::conditions;
use sluice_core::coordinator;
use sluice_core::model::{JobOp, Status};
use sluice_core::status::StatusTable;
use sluice_store::FsJobStore;
use std::collections::BTreeMap;

pub fn handle_status(args: StatusArgs, ctx: &AppContext) -> Result<(), CliError> {
    let store = ctx.store()?;
    let scheduler = ctx.scheduler();
    let mut records = ctx.records()?;

    let spinner = commands::reconcile_spinner("Reconciling status...");
    let table = coordinator::fetch_status(&store, &ctx.graph, scheduler.as_ref(), &mut records)?;
    spinner.finish_and_clear();

    commands::warn_degraded(table.degraded.as_deref());

    println!(
        "Project '{}': {} job(s), {} operation(s), scheduler '{}'",
        ctx.config.name.bold(),
        table.jobs.len(),
        ctx.graph.len(),
        scheduler.name().cyan()
    );

    if args.detailed {
        print_detailed(ctx, &store, &table)?;
    } else {
        print_overview(ctx, &table);
        print_label_summary(ctx, &store, &table);
    }

    for error in &table.errors {
        eprintln!("{}", format!("[ERROR] {}", error).red());
    }
    Ok(())
}

/// One row per operation with a status histogram over all jobs.
fn print_overview(ctx: &AppContext, table: &StatusTable) {
    let mut view = Table::new();
    view.load_preset(presets::UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            header_cell("Operation"),
            header_cell("Completed"),
            header_cell("Active"),
            header_cell("Queued"),
            header_cell("Eligible"),
            header_cell("Ineligible"),
            header_cell("Error"),
        ]);

    for op in ctx.graph.in_order() {
        let mut counts: BTreeMap<Status, usize> = BTreeMap::new();
        for job in &table.jobs {
            if let Some(status) = table.status(&JobOp::new(op.name.clone(), job.clone())) {
                *counts.entry(status).or_insert(0) += 1;
            }
        }
        view.add_row(vec![
            Cell::new(&op.name.0).fg(Color::Yellow),
            count_cell(&counts, Status::Completed, Color::Green),
            count_cell(&counts, Status::Active, Color::Cyan),
            count_cell(&counts, Status::Queued, Color::Blue),
            count_cell(&counts, Status::Eligible, Color::White),
            count_cell(&counts, Status::Ineligible, Color::DarkGrey),
            count_cell(&counts, Status::Error, Color::Red),
        ]);
    }
    println!("{}", view);
}

/// One row per pair, with the job id, statepoint and labels on the first
/// row of each job block.
fn print_detailed(
    ctx: &AppContext,
    store: &FsJobStore,
    table: &StatusTable,
) -> Result<(), CliError> {
    let mut view = Table::new();
    view.load_preset(presets::UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            header_cell("Job"),
            header_cell("Statepoint"),
            header_cell("Labels"),
            header_cell("Operation"),
            header_cell("Status"),
        ]);

    for job in &table.jobs {
        let statepoint = store.statepoint(job)?;
        let labels = conditions::classify(store, job, &ctx.config.labels).join(", ");
        let mut first = true;
        for op in ctx.graph.in_order() {
            let pair = JobOp::new(op.name.clone(), job.clone());
            let Some(status) = table.status(&pair) else {
                continue;
            };
            let (job_cell, statepoint_cell, label_cell) = if first {
                (
                    Cell::new(job.short_id()).fg(Color::Yellow),
                    Cell::new(compact_json(&statepoint)),
                    Cell::new(&labels).fg(Color::Green),
                )
            } else {
                (Cell::new(""), Cell::new(""), Cell::new(""))
            };
            first = false;
            view.add_row(vec![
                job_cell,
                statepoint_cell,
                label_cell,
                Cell::new(&op.name.0),
                status_cell(status),
            ]);
        }
    }
    println!("{}", view);
    Ok(())
}

fn print_label_summary(ctx: &AppContext, store: &FsJobStore, table: &StatusTable) {
    if ctx.config.labels.is_empty() {
        return;
    }
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for job in &table.jobs {
        for label in conditions::classify(store, job, &ctx.config.labels) {
            *counts.entry(label).or_insert(0) += 1;
        }
    }
    if counts.is_empty() {
        println!("- Labels: none apply.");
        return;
    }
    let parts: Vec<String> = counts
        .into_iter()
        .map(|(name, n)| format!("{} ({})", name.green(), n))
        .collect();
    println!("- Labels: {}", parts.join(", "));
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold).fg(Color::Cyan)
}

fn count_cell(counts: &BTreeMap<Status, usize>, status: Status, color: Color) -> Cell {
    match counts.get(&status).copied().unwrap_or(0) {
        0 => Cell::new("-").fg(Color::DarkGrey),
        n => Cell::new(n).fg(color),
    }
}

fn status_cell(status: Status) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        Status::Completed => cell.fg(Color::Green),
        Status::Active => cell.fg(Color::Cyan),
        Status::Queued => cell.fg(Color::Blue),
        Status::Eligible => cell.fg(Color::White).add_attribute(Attribute::Bold),
        Status::Ineligible => cell.fg(Color::DarkGrey),
        Status::Error => cell.fg(Color::Red),
    }
}

fn compact_json(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".to_string())
}
