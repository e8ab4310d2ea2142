//! SLURM adapter: `sbatch` to submit, one batched `squeue` to poll.

use crate::script;
use once_cell::sync::Lazy;
use regex::Regex;
use sluice_core::constants::schedulers;
use sluice_core::errors::SchedError;
use sluice_core::logging;
use sluice_core::model::Bundle;
use sluice_core::scheduler::{QueueState, Scheduler, SchedulerId};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::process::Command;

static SUBMIT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Submitted batch job (\d+)").expect("submit id pattern must compile"));

pub struct SlurmScheduler {
    scripts_dir: PathBuf,
}

impl SlurmScheduler {
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        SlurmScheduler {
            scripts_dir: scripts_dir.into(),
        }
    }
}

impl Scheduler for SlurmScheduler {
    fn name(&self) -> &str {
        schedulers::SLURM
    }

    fn submit(&self, bundle: &Bundle, script: &str) -> Result<SchedulerId, SchedError> {
        let path = script::write_script(&self.scripts_dir, &bundle.label, script)?;

        let mut cmd = Command::new("sbatch");
        cmd.arg(&path);
        logging::log_command(&cmd);

        let output = cmd.output().map_err(|e| SchedError::Unavailable {
            scheduler: self.name().to_string(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SchedError::Rejected {
                scheduler: self.name().to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_submit_output(&stdout)
    }

    fn query(
        &self,
        ids: &BTreeSet<SchedulerId>,
    ) -> Result<HashMap<SchedulerId, QueueState>, SchedError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list = ids
            .iter()
            .map(|id| id.0.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut cmd = Command::new("squeue");
        cmd.arg("-h").arg("-o").arg("%i %T").arg("-j").arg(&id_list);
        logging::log_command(&cmd);

        let output = cmd.output().map_err(|e| SchedError::Unavailable {
            scheduler: self.name().to_string(),
            reason: e.to_string(),
        })?;

        // squeue exits non-zero when every listed id has already left the
        // queue; those ids read as Unknown below, which is the answer.
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() && !stderr.contains("Invalid job id") {
            return Err(SchedError::Unavailable {
                scheduler: self.name().to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut states = parse_queue_output(&stdout);
        for id in ids {
            states.entry(id.clone()).or_insert(QueueState::Unknown);
        }
        Ok(states)
    }
}

fn parse_submit_output(stdout: &str) -> Result<SchedulerId, SchedError> {
    SUBMIT_ID_RE
        .captures(stdout)
        .and_then(|c| c.get(1))
        .map(|m| SchedulerId(m.as_str().to_string()))
        .ok_or_else(|| SchedError::IdParse(stdout.trim().to_string()))
}

fn parse_queue_output(stdout: &str) -> HashMap<SchedulerId, QueueState> {
    let mut states = HashMap::new();
    for line in stdout.lines() {
        let mut fields = line.split_whitespace();
        let (Some(id), Some(state)) = (fields.next(), fields.next()) else {
            continue;
        };
        states.insert(SchedulerId(id.to_string()), queue_state(state));
    }
    states
}

fn queue_state(state: &str) -> QueueState {
    match state {
        "PENDING" | "CONFIGURING" | "REQUEUED" | "REQUEUE_FED" | "REQUEUE_HOLD" => {
            QueueState::Queued
        }
        "RUNNING" | "COMPLETING" | "SUSPENDED" | "STAGE_OUT" | "SIGNALING" => QueueState::Active,
        "COMPLETED" | "FAILED" | "TIMEOUT" | "PREEMPTED" | "NODE_FAIL" | "BOOT_FAIL"
        | "DEADLINE" | "OUT_OF_MEMORY" => QueueState::Terminal,
        s if s.starts_with("CANCELLED") => QueueState::Terminal,
        _ => QueueState::Unknown,
    }
}
