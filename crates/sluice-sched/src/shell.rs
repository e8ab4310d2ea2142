//! Shell adapter: runs each bundle script synchronously at submit time.
//!
//! For machines without a batch system. A "submission" here is the
//! execution itself: by the time submit returns, the script has run, so
//! every recorded id reads back as terminal and the next pass judges the
//! outcome by post-conditions alone.

use crate::script;
use sluice_core::constants::schedulers;
use sluice_core::errors::SchedError;
use sluice_core::logging;
use sluice_core::model::Bundle;
use sluice_core::scheduler::{QueueState, Scheduler, SchedulerId};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct ShellScheduler {
    scripts_dir: PathBuf,
    seq: AtomicU64,
}

impl ShellScheduler {
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        ShellScheduler {
            scripts_dir: scripts_dir.into(),
            seq: AtomicU64::new(0),
        }
    }
}

impl Scheduler for ShellScheduler {
    fn name(&self) -> &str {
        schedulers::SHELL
    }

    fn submit(&self, bundle: &Bundle, script: &str) -> Result<SchedulerId, SchedError> {
        let path = script::write_script(&self.scripts_dir, &bundle.label, script)?;

        let mut cmd = Command::new("sh");
        cmd.arg(&path);
        logging::log_command(&cmd);
        tracing::info!(bundle = %bundle.label, "Running bundle script");

        let output = cmd.output().map_err(|e| SchedError::Unavailable {
            scheduler: self.name().to_string(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SchedError::Rejected {
                scheduler: self.name().to_string(),
                reason: format!("script exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        Ok(SchedulerId(format!("shell-{}-{}", std::process::id(), seq)))
    }

    fn query(
        &self,
        ids: &BTreeSet<SchedulerId>,
    ) -> Result<HashMap<SchedulerId, QueueState>, SchedError> {
        Ok(ids
            .iter()
            .map(|id| (id.clone(), QueueState::Terminal))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::BatchScriptRenderer;
    use sluice_core::model::{Directives, JobId, JobOp, OpName, TaskSpec};
    use sluice_core::render::ScriptRenderer;

    fn bundle_for(command: &str, workspace: &std::path::Path) -> Bundle {
        Bundle {
            label: "sluice-test-00000000".to_string(),
            tasks: vec![TaskSpec {
                pair: JobOp::new(OpName("touch".into()), JobId("job1".into())),
                command: command.to_string(),
                workspace: workspace.to_path_buf(),
            }],
            directives: Directives::default(),
        }
    }

    #[test]
    fn test_submit_runs_the_script() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir_all(&ws).unwrap();

        let sched = ShellScheduler::new(dir.path().join("scripts"));
        let bundle = bundle_for("touch ran.txt", &ws);
        let script = BatchScriptRenderer.render(&bundle);

        let id = sched.submit(&bundle, &script).unwrap();
        assert!(id.0.starts_with("shell-"));
        assert!(ws.join("ran.txt").exists());
    }

    #[test]
    fn test_failed_script_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir_all(&ws).unwrap();

        let sched = ShellScheduler::new(dir.path().join("scripts"));
        let bundle = bundle_for("exit 3", &ws);
        let script = BatchScriptRenderer.render(&bundle);

        assert!(matches!(
            sched.submit(&bundle, &script),
            Err(SchedError::Rejected { .. })
        ));
    }

    #[test]
    fn test_query_reports_everything_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let sched = ShellScheduler::new(dir.path());
        let ids: BTreeSet<SchedulerId> = [
            SchedulerId("shell-1-0".to_string()),
            SchedulerId("shell-1-1".to_string()),
        ]
        .into_iter()
        .collect();

        let states = sched.query(&ids).unwrap();
        assert_eq!(states.len(), 2);
        assert!(states.values().all(|s| *s == QueueState::Terminal));
    }
}
