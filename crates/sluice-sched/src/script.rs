use sluice_core::errors::SchedError;
use sluice_core::model::Bundle;
use sluice_core::render::ScriptRenderer;
use std::path::{Path, PathBuf};

pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Writes a rendered script into the scripts directory, named after the
/// bundle label.
pub(crate) fn write_script(dir: &Path, label: &str, script: &str) -> Result<PathBuf, SchedError> {
    fs_err::create_dir_all(dir).map_err(|source| SchedError::ScriptIo {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{}.sh", label));
    fs_err::write(&path, script).map_err(|source| SchedError::ScriptIo {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Renders a bundle as a POSIX shell script with `#SBATCH` directive
/// lines. SLURM reads the directives; the shell adapter skips them as
/// comments, so one renderer serves both adapters.
///
/// Tasks run serially in bundle order. A failing task does not stop the
/// rest: whether a task's work actually happened is judged afterwards by
/// its post-conditions, not by the script's exit status.
pub struct BatchScriptRenderer;

impl ScriptRenderer for BatchScriptRenderer {
    fn render(&self, bundle: &Bundle) -> String {
        let mut script = String::from("#!/bin/bash\n");
        script.push_str(&format!("#SBATCH --job-name={}\n", bundle.label));
        script.push_str(&format!("#SBATCH --ntasks={}\n", bundle.directives.np));
        if let Some(walltime) = &bundle.directives.walltime {
            script.push_str(&format!("#SBATCH --time={}\n", walltime));
        }
        if let Some(memory) = &bundle.directives.memory {
            script.push_str(&format!("#SBATCH --mem={}\n", memory));
        }
        if let Some(partition) = &bundle.directives.partition {
            script.push_str(&format!("#SBATCH --partition={}\n", partition));
        }
        for opt in &bundle.directives.submit_opts {
            script.push_str(&format!("#SBATCH {}\n", opt));
        }
        for task in &bundle.tasks {
            script.push_str(&format!(
                "\n# {}\ncd {} && {}\n",
                task.pair,
                shell_quote(&task.workspace.to_string_lossy()),
                task.command
            ));
        }
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::model::{Directives, JobId, JobOp, OpName, TaskSpec};
    use std::path::PathBuf;

    fn bundle() -> Bundle {
        Bundle {
            label: "sluice-melt-ab12cd34".to_string(),
            tasks: vec![TaskSpec {
                pair: JobOp::new(OpName("melt".into()), JobId("deadbeef".into())),
                command: "python melt.py deadbeef".to_string(),
                workspace: PathBuf::from("/tmp/ws/dead beef"),
            }],
            directives: Directives {
                np: 8,
                walltime: Some("04:00:00".to_string()),
                memory: Some("16G".to_string()),
                partition: Some("standard".to_string()),
                submit_opts: vec!["--gres=gpu:1".to_string()],
            },
        }
    }

    #[test]
    fn test_shell_quote_simple() {
        assert_eq!(shell_quote("hello"), "'hello'");
    }

    #[test]
    fn test_shell_quote_with_single_quote() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_shell_quote_with_spaces() {
        assert_eq!(shell_quote("hello world"), "'hello world'");
    }

    #[test]
    fn test_render_emits_all_directives() {
        let script = BatchScriptRenderer.render(&bundle());
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("#SBATCH --job-name=sluice-melt-ab12cd34"));
        assert!(script.contains("#SBATCH --ntasks=8"));
        assert!(script.contains("#SBATCH --time=04:00:00"));
        assert!(script.contains("#SBATCH --mem=16G"));
        assert!(script.contains("#SBATCH --partition=standard"));
        assert!(script.contains("#SBATCH --gres=gpu:1"));
    }

    #[test]
    fn test_render_quotes_workspace_path() {
        let script = BatchScriptRenderer.render(&bundle());
        assert!(script.contains("cd '/tmp/ws/dead beef' && python melt.py deadbeef"));
    }

    #[test]
    fn test_render_skips_unset_directives() {
        let mut b = bundle();
        b.directives = Directives::default();
        let script = BatchScriptRenderer.render(&b);
        assert!(!script.contains("--time"));
        assert!(!script.contains("--mem"));
        assert!(!script.contains("--partition"));
        assert!(script.contains("#SBATCH --ntasks=1"));
    }
}
