use crate::cli::AddArgs;
use crate::commands::AppContext;
use crate::error::CliError;
use sluice_core::errors::ConfigError;
use sluice_store::FsJobStore;

/// Content-addresses a statepoint and creates its job directory. Adding the
/// same statepoint twice is a no-op that prints the same id, so scripted
/// parameter scans can be re-run safely.
pub fn handle_add(args: AddArgs, ctx: &AppContext) -> Result<(), CliError> {
    let statepoint: serde_json::Value = serde_json::from_str(&args.statepoint)?;
    if !statepoint.is_object() {
        return Err(
            ConfigError::General("a statepoint must be a JSON object".to_string()).into(),
        );
    }
    let store = FsJobStore::init(ctx.config.workspace_dir())?;
    let job = store.init_job(&statepoint)?;
    println!("{}", job);
    Ok(())
}
