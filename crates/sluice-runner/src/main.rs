mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use commands::AppContext;
use error::CliError;
use sluice_core::config::LoggingConfig;
use sluice_core::logging::{self, LogLevel};
use std::path::Path;

fn main() {
    let cli = Cli::parse();

    logging::set_log_level_from_env();
    if cli.verbose > 0 {
        logging::set_log_level(LogLevel::from(cli.verbose.saturating_add(2)));
    }

    if let Err(e) = run(cli) {
        eprintln!("{}", format!("[ERROR] {}", e).red());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let scheduler = cli.scheduler.as_deref();
    match cli.command {
        Commands::Init(args) => {
            // No project exists yet, so the session log has nowhere to live.
            logging::init_cli_logging(None, &LoggingConfig::default())?;
            commands::init::handle_init(args, &cli.project)
        }
        Commands::Add(args) => with_project(&cli.project, scheduler, |ctx| {
            commands::add::handle_add(args, ctx)
        }),
        Commands::Status(args) => with_project(&cli.project, scheduler, |ctx| {
            commands::status::handle_status(args, ctx)
        }),
        Commands::Next(args) => with_project(&cli.project, scheduler, |ctx| {
            commands::next::handle_next(args, ctx)
        }),
        Commands::Run(args) => with_project(&cli.project, scheduler, |ctx| {
            commands::run::handle_run(args, ctx)
        }),
        Commands::Exec(args) => with_project(&cli.project, scheduler, |ctx| {
            commands::exec::handle_exec(args, ctx)
        }),
        Commands::Script(args) => with_project(&cli.project, scheduler, |ctx| {
            commands::script::handle_script(args, ctx)
        }),
        Commands::Submit(args) => with_project(&cli.project, scheduler, |ctx| {
            commands::submit::handle_submit(args, ctx)
        }),
    }
}

fn with_project<F>(project: &Path, scheduler: Option<&str>, f: F) -> Result<(), CliError>
where
    F: FnOnce(&AppContext) -> Result<(), CliError>,
{
    let ctx = AppContext::open(project, scheduler)?;
    let _session_log = logging::init_cli_logging(Some(&ctx.config.state_dir), &ctx.config.logging)?;
    f(&ctx)
}
