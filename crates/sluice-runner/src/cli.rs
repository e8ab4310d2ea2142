use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sluice",
    author,
    version,
    about = "A submission engine for parameterized job workspaces.",
    long_about = "sluice walks a workspace of parameterized jobs through the operations declared in sluice.toml and submits whatever has become eligible to a batch scheduler."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short,
        long,
        global = true,
        default_value = ".",
        help = "Project directory, or any directory inside one"
    )]
    pub project: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity level (-v for debug, -vv for trace)")]
    pub verbose: u8,

    #[arg(
        long,
        global = true,
        help = "The scheduler to use: 'slurm' or 'shell'. Overrides the project's configuration."
    )]
    pub scheduler: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create a sluice.toml starter and an empty workspace")]
    Init(InitArgs),

    #[command(about = "Add a job for a statepoint and print its id")]
    Add(AddArgs),

    #[command(about = "Show the status of every job/operation pair")]
    Status(StatusArgs),

    #[command(about = "List jobs for which an operation is eligible")]
    Next(NextArgs),

    #[command(about = "Execute eligible operations directly, one sweep")]
    Run(RunArgs),

    #[command(about = "Execute one operation for given jobs, skipping all condition checks")]
    Exec(ExecArgs),

    #[command(about = "Print the scripts a submit pass would hand to the scheduler")]
    Script(ScriptArgs),

    #[command(about = "Submit eligible operations to the scheduler")]
    Submit(SubmitArgs),
}

#[derive(Args)]
pub struct InitArgs {
    #[arg(help = "Project name (defaults to the directory name)")]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(help = "Statepoint as a JSON object, e.g. '{\"temperature\": 1.5}'")]
    pub statepoint: String,
}

#[derive(Args)]
pub struct StatusArgs {
    #[arg(
        long,
        help = "One row per job/operation pair instead of the aggregate view"
    )]
    pub detailed: bool,
}

#[derive(Args)]
pub struct NextArgs {
    #[arg(help = "Operation name")]
    pub operation: String,
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(value_name = "OPERATION", help = "Restrict the sweep to these operations")]
    pub operations: Vec<String>,

    #[arg(
        long,
        short = 'n',
        help = "Cap the number of operations executed in this sweep"
    )]
    pub num: Option<usize>,
}

#[derive(Args)]
pub struct ExecArgs {
    #[arg(help = "Operation name")]
    pub operation: String,

    #[arg(
        value_name = "JOB_ID",
        help = "Job ids or unambiguous prefixes (all jobs if omitted)"
    )]
    pub jobs: Vec<String>,
}

#[derive(Args)]
pub struct ScriptArgs {
    #[arg(value_name = "OPERATION", help = "Restrict selection to these operations")]
    pub operations: Vec<String>,

    #[arg(
        long,
        short = 'b',
        help = "Pairs per bundle; 0 bundles everything together. Defaults to the project setting."
    )]
    pub bundle_size: Option<usize>,
}

#[derive(Args)]
pub struct SubmitArgs {
    #[arg(value_name = "OPERATION", help = "Restrict selection to these operations")]
    pub operations: Vec<String>,

    #[arg(
        long,
        short = 'j',
        value_name = "JOB_ID",
        help = "Restrict selection to these jobs (ids or unambiguous prefixes)"
    )]
    pub jobs: Vec<String>,

    #[arg(
        long,
        short = 'b',
        help = "Pairs per bundle; 0 bundles everything together. Defaults to the project setting."
    )]
    pub bundle_size: Option<usize>,

    #[arg(long, help = "Allow one bundle to mix different operations")]
    pub parallel_ops: bool,

    #[arg(
        long,
        short = 'n',
        help = "Cap the number of pairs submitted in this pass"
    )]
    pub num: Option<usize>,

    #[arg(long, help = "Render and print the scripts without submitting")]
    pub pretend: bool,
}
