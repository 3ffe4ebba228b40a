//! Error types for pressure solving.

use pn_core::error::PnError;
use pn_network::NetworkError;
use thiserror::Error;

/// Errors that can occur while assembling or solving a pressure field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Problem setup error: {what}")]
    ProblemSetup { what: String },

    /// The imposed boundary condition cannot be met by the network.
    #[error("Inconsistent boundary condition: {what}")]
    InconsistentBoundary { what: String },

    #[error("Convergence failed after {iterations} iterations (relative residual {residual:e})")]
    ConvergenceFailed { iterations: usize, residual: f64 },

    #[error("Pressure matrix is not positive definite")]
    NotPositiveDefinite,

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl From<SolverError> for PnError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::ProblemSetup { what } => PnError::Invariant { what },
            SolverError::InconsistentBoundary { .. } => PnError::InvalidArg {
                what: "boundary condition",
            },
            SolverError::ConvergenceFailed { .. } => PnError::InvalidArg {
                what: "convergence",
            },
            SolverError::NotPositiveDefinite => PnError::InvalidArg {
                what: "pressure matrix",
            },
            SolverError::Numeric { what } => PnError::Invariant { what },
            SolverError::Network(e) => e.into(),
        }
    }
}
