//! Error types for displacement and transport stages.

use pn_capillary::CapillaryError;
use pn_core::{ElementId, PnError};
use pn_network::NetworkError;
use pn_solver::SolverError;
use thiserror::Error;

/// Errors raised while running a stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// A transported quantity left [0, 1]; the run must stop.
    #[error("{what} {value} outside [0, 1] in element {element}")]
    OutOfBounds {
        what: &'static str,
        element: ElementId,
        value: f64,
    },

    #[error("Pressure solve failed: {0}")]
    Solver(#[from] SolverError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Capillary model error: {0}")]
    Capillary(#[from] CapillaryError),

    #[error(transparent)]
    Core(#[from] PnError),
}

pub type SimResult<T> = Result<T, SimError>;
