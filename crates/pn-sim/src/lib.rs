//! Displacement and transport stages for porenet.
//!
//! Provides:
//! - One invasion skeleton with five displacement strategies
//!   (primary drainage, spontaneous imbibition, forced water injection,
//!   spontaneous oil invasion, secondary drainage)
//! - Trapping detection through phase continuity clusters
//! - Relative permeability from per-phase pressure solves
//! - Explicit tracer and unsteady saturation transport
//! - Cooperative interruption and stage events

pub mod connectivity;
pub mod context;
pub mod error;
pub mod events;
pub mod interrupt;
pub mod invasion;
pub mod relperm;
pub mod strategy;
pub mod transport;
pub mod unsteady;

pub use connectivity::{cluster_phase_continuity, update_trapping};
pub use context::SimContext;
pub use error::{SimError, SimResult};
pub use events::{CurveSample, ElementRecord, EventSink, Snapshot, StageEvent, TransportSample};
pub use interrupt::InterruptFlag;
pub use invasion::{InvasionOptions, StageOutcome, Termination, run_displacement};
pub use relperm::{RelPerm, RelPermEvaluator};
pub use strategy::{
    Displacement, DisplacementKind, ForcedWaterInjection, PrimaryDrainage, SecondaryDrainage,
    SpontaneousImbibition, SpontaneousOilInvasion, Sweep, displacement,
};
pub use transport::{TracerOptions, TransportOutcome, run_tracer};
pub use unsteady::{UnsteadyOptions, fractional_flow, max_fractional_slope, run_unsteady};
