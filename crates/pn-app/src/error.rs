//! Error types for the pn-app service layer.

use std::path::PathBuf;

/// Application error wrapping the backend crates' errors for the CLI and
/// the worker thread.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read configuration file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Failed to write run output: {path}")]
    OutputWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pn-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<pn_network::NetworkError> for AppError {
    fn from(err: pn_network::NetworkError) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<pn_solver::SolverError> for AppError {
    fn from(err: pn_solver::SolverError) -> Self {
        AppError::Solver(err.to_string())
    }
}

impl From<pn_sim::SimError> for AppError {
    fn from(err: pn_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialize(err.to_string())
    }
}
