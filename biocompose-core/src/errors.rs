use thiserror::Error;

/// Error type for invalid compositions and failed runs.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Unknown type {0:?}")]
    UnknownType(String),
    #[error("Malformed type expression {0:?}")]
    MalformedTypeExpr(String),
    #[error("Invalid state path {0:?}")]
    MalformedPath(String),
    #[error("Malformed step address {0:?}. Expected namespace:TypeName")]
    MalformedAddress(String),
    #[error("No step registered for address {0:?}")]
    UnknownStepAddress(String),
    #[error("Value does not conform to type {type_name:?}: {detail}")]
    TypeMismatch { type_name: String, detail: String },
    #[error("Invalid step configuration: {0}")]
    Configuration(String),
    #[error("Invalid composition: {0}")]
    Composition(String),
    #[error("Step {step:?} output port {port:?} violates its contract: {detail}")]
    PortContractViolation {
        step: String,
        port: String,
        detail: String,
    },
    #[error("{0}")]
    Lifecycle(String),
    #[error(
        "Steady-state solver did not converge after {iterations} iterations (residual {residual:e})"
    )]
    SteadyStateConvergence { iterations: usize, residual: f64 },
    #[error("Comparison requires at least two result series, got {0}")]
    InsufficientResults(usize),
    #[error("Step {step:?} failed: {source}")]
    StepFailed {
        step: String,
        source: Box<ComposeError>,
    },
    #[error("Simulation failed: {0}")]
    Simulation(String),
    #[error("Invalid document: {0}")]
    DocumentFormat(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type for `Result<T, ComposeError>`.
pub type ComposeResult<T> = Result<T, ComposeError>;
