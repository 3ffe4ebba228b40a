//! Application layer for porenet.
//!
//! Loads and validates run configurations, sequences the configured stages
//! over one network and runs them on a dedicated worker thread. Shared by
//! the CLI and any other front end.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod worker;

pub use config::{
    AgeingDef, BoundaryDef, DisplacementDef, FluidsDef, LatticeDef, OutputDef, SimulationConfig,
    SolverDef, SolverMethodDef, StageDef, TracerDef, UnsteadyDef, WettabilityDef,
    WettabilityModelDef, build_network, load_config, parse_config, validate_config,
};
pub use error::{AppError, AppResult};
pub use orchestrator::{Orchestrator, RunObserver, RunReport, RunSummary, StageReport, StageStatus};
pub use progress::{RunEvent, RunProgress, overall_percent};
pub use worker::{InterruptHandle, SimulationWorker, WorkerMessage};
