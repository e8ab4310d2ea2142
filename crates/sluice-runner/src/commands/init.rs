use crate::cli::InitArgs;
use crate::error::CliError;
use colored::Colorize;
use sluice_core::constants::{dirs, files};
use sluice_core::errors::ConfigError;
use std::path::Path;

pub fn handle_init(args: InitArgs, project_arg: &Path) -> Result<(), CliError> {
    let root = if project_arg.is_absolute() {
        project_arg.to_path_buf()
    } else {
        std::env::current_dir()?.join(project_arg)
    };
    std::fs::create_dir_all(&root)?;

    let config_path = root.join(files::PROJECT_CONFIG);
    if config_path.exists() {
        return Err(ConfigError::ProjectExists(config_path).into());
    }

    let name = match args.name {
        Some(name) => name,
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string()),
    };

    std::fs::write(&config_path, starter_config(&name))?;
    std::fs::create_dir_all(root.join(dirs::WORKSPACE))?;
    tracing::info!(name = %name, root = %root.display(), "initialized project");

    println!(
        "- Initialized project '{}' in {}",
        name.bold(),
        root.display()
    );
    println!(
        "  Declare operations in {} and add jobs with '{}'.",
        files::PROJECT_CONFIG.cyan(),
        "sluice add".cyan()
    );
    Ok(())
}

fn starter_config(name: &str) -> String {
    format!(
        r#"[project]
name = "{name}"

[submit]
# scheduler = "slurm"
bundle_size = 1

# Operations are swept in dependency order. A pair (job, operation) is
# eligible when all of its pre-conditions hold; it is completed when all
# of its post-conditions hold. Operations without post-conditions never
# read as completed.
#
# [[operation]]
# name = "estimate"
# command = "python estimate.py {{workspace}}"
# pre = [{{ file-exists = "input.dat" }}]
# post = [{{ file-exists = "estimate.done" }}]
# after = []
#
# [operation.directives]
# np = 4
# walltime = "01:00:00"

[[operation]]
name = "hello"
command = "echo hello from {{job.short}} > hello.txt"
post = [{{ file-exists = "hello.txt" }}]
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::config::{ProjectConfig, UserConfig};

    #[test]
    fn test_starter_config_parses_and_runs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(files::PROJECT_CONFIG),
            starter_config("demo"),
        )
        .unwrap();
        let config = ProjectConfig::load(dir.path(), &UserConfig::default()).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.operations.len(), 1);
        assert_eq!(config.operations[0].name.0, "hello");
        assert!(!config.operations[0].post.is_empty());
    }

    #[test]
    fn test_init_refuses_existing_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(files::PROJECT_CONFIG), "[project]\n").unwrap();
        let err = handle_init(
            InitArgs { name: None },
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CliError::Config(ConfigError::ProjectExists(_))
        ));
    }
}
