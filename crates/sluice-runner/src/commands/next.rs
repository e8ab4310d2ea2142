use crate::cli::NextArgs;
use crate::commands::{self, AppContext};
use crate::error::CliError;
use sluice_core::coordinator::{self, PassOptions};

/// Prints one job id per line, so the output can feed a shell pipeline:
/// `sluice next estimate | xargs -n1 inspect.sh`.
pub fn handle_next(args: NextArgs, ctx: &AppContext) -> Result<(), CliError> {
    let filter = commands::op_filter(ctx, std::slice::from_ref(&args.operation))?;
    let store = ctx.store()?;
    let scheduler = ctx.scheduler();
    let mut records = ctx.records()?;

    let table = coordinator::fetch_status(&store, &ctx.graph, scheduler.as_ref(), &mut records)?;
    commands::warn_degraded(table.degraded.as_deref());

    let opts = PassOptions {
        op_filter: filter,
        ..PassOptions::default()
    };
    for pair in coordinator::select_pairs(&table, &ctx.graph, &opts) {
        println!("{}", pair.job);
    }
    Ok(())
}
