pub mod files {
    pub const PROJECT_CONFIG: &str = "sluice.toml";
    pub const RECORDS: &str = "records.json";
    pub const STATEPOINT: &str = "statepoint.json";
    pub const DOCUMENT: &str = "document.json";
}

pub mod dirs {
    pub const SLUICE: &str = "sluice";
    pub const STATE: &str = ".sluice";
    pub const WORKSPACE: &str = "workspace";
    pub const LOGS: &str = "logs";
    pub const SCRIPTS: &str = "scripts";
}

pub mod schedulers {
    pub const SLURM: &str = "slurm";
    pub const SHELL: &str = "shell";
}

pub mod env {
    pub const LOG_LEVEL: &str = "SLUICE_LOG_LEVEL";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_constants() {
        assert_eq!(files::PROJECT_CONFIG, "sluice.toml");
        assert_eq!(files::RECORDS, "records.json");
    }

    #[test]
    fn test_dir_constants() {
        assert_eq!(dirs::STATE, ".sluice");
        assert_eq!(dirs::WORKSPACE, "workspace");
    }

    #[test]
    fn test_scheduler_constants() {
        assert_eq!(schedulers::SLURM, "slurm");
        assert_eq!(schedulers::SHELL, "shell");
    }
}
