use serde_json::json;
use sluice_core::config::{ProjectConfig, UserConfig};
use sluice_core::graph::OperationGraph;
use sluice_core::model::JobId;
use sluice_core::records::RecordStore;
use sluice_store::FsJobStore;
use std::fs;
use std::path::PathBuf;

/// A throwaway project rooted in a temp directory: a `sluice.toml`, a
/// workspace, and accessors for the pieces the engine needs. The temp
/// directory lives as long as the harness.
pub struct TestProject {
    pub _temp_dir: tempfile::TempDir,
    pub root: PathBuf,
}

impl TestProject {
    pub fn new(config_toml: &str) -> Self {
        let temp_dir = tempfile::Builder::new()
            .prefix("sluice-test-")
            .tempdir()
            .expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        fs::write(root.join("sluice.toml"), config_toml).expect("Failed to write sluice.toml");
        TestProject {
            _temp_dir: temp_dir,
            root,
        }
    }

    pub fn config(&self) -> ProjectConfig {
        ProjectConfig::load(&self.root, &UserConfig::default())
            .expect("test project config must load")
    }

    pub fn graph(&self) -> OperationGraph {
        let config = self.config();
        OperationGraph::build(config.operations, config.infer_dependencies)
            .expect("test project graph must build")
    }

    pub fn store(&self) -> FsJobStore {
        FsJobStore::init(self.config().workspace_dir()).expect("workspace must initialize")
    }

    pub fn records(&self) -> RecordStore {
        RecordStore::open(&self.config().state_dir).expect("record store must open")
    }

    /// Initializes `n` jobs with statepoints `{"n": 0}` .. `{"n": n-1}`
    /// and returns their ids in sorted order.
    pub fn init_jobs(&self, n: usize) -> Vec<JobId> {
        let store = self.store();
        let mut jobs: Vec<JobId> = (0..n)
            .map(|i| {
                store
                    .init_job(&json!({ "n": i }))
                    .expect("job must initialize")
            })
            .collect();
        jobs.sort();
        jobs
    }

    /// Touches a file in one job's workspace, the way a real operation
    /// would leave its product behind.
    pub fn touch(&self, job: &JobId, name: &str) {
        let dir = self.config().workspace_dir().join(&job.0);
        fs::write(dir.join(name), "").expect("Failed to touch workspace file");
    }
}
