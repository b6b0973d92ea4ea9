use biocompose_core::errors::ComposeError;
use thiserror::Error;

/// Error type for the experiment pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to parse SED-ML: {0}")]
    SedParse(String),
    #[error("No uniform time course simulation found in the SED-ML document")]
    NoUtcFound,
    #[error("Biomodel {id:?} has no {kind} file")]
    MissingModelFile { id: String, kind: &'static str },
    #[error("Repository error: {0}")]
    Repository(String),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type for `Result<T, PipelineError>`.
pub type PipelineResult<T> = Result<T, PipelineError>;
