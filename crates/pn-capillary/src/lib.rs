//! pn-capillary: capillary physics for porenet.
//!
//! Fluid properties, hydraulic conductances, entry and snap-off thresholds,
//! corner films and wettability ageing. Everything here is a pure function of
//! element geometry and state; the displacement logic lives in `pn-sim`.

pub mod conductance;
pub mod error;
pub mod films;
pub mod fluids;
pub mod threshold;
pub mod wettability;

pub use conductance::{
    assign_phase, assign_single_phase, bulk_conductance, mixture_conductance, phase_conductance,
};
pub use error::{CapillaryError, CapillaryResult};
pub use films::{
    DEFAULT_CORNER_RESISTANCE, clear_films, corner_area, film_conductance, update_element_films,
    update_films,
};
pub use fluids::FluidProps;
pub use threshold::{
    check_contact_angle, oil_snap_off_pressure, piston_entry_pressure, water_snap_off_pressure,
};
pub use wettability::{Ageing, WettabilityModel, apply_ageing};
