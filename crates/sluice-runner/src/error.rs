use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] sluice_core::errors::ConfigError),

    #[error(transparent)]
    Graph(#[from] sluice_core::errors::GraphError),

    #[error(transparent)]
    Store(#[from] sluice_core::errors::StoreError),

    #[error(transparent)]
    Pass(#[from] sluice_core::errors::PassError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Unknown operation '{0}'. Defined operations: {1}.")]
    UnknownOperation(String, String),

    #[error("No job matches id or prefix '{0}'.")]
    NoSuchJob(String),

    #[error("Job id prefix '{prefix}' is ambiguous: matches {matches}.")]
    AmbiguousJob { prefix: String, matches: String },
}
