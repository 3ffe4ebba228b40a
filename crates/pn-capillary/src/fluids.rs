//! Fluid properties shared by every stage.

use pn_core::units::{DynVisc, pa_s};
use pn_network::Phase;

use crate::error::{CapillaryError, CapillaryResult};

/// Constant properties of the oil/water pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidProps {
    pub water_viscosity: DynVisc,
    pub oil_viscosity: DynVisc,
    /// Oil/water interfacial tension (N/m)
    pub interfacial_tension: f64,
    /// Molecular diffusion coefficient of the tracer in water (m²/s)
    pub tracer_diffusivity: f64,
}

impl Default for FluidProps {
    fn default() -> Self {
        Self {
            water_viscosity: pa_s(1.0e-3),
            oil_viscosity: pa_s(1.0e-3),
            interfacial_tension: 0.03,
            tracer_diffusivity: 1.0e-9,
        }
    }
}

impl FluidProps {
    /// Dynamic viscosity of `phase` in Pa·s (tracer-labelled water uses water's).
    pub fn viscosity(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Oil => self.oil_viscosity.value,
            Phase::Water | Phase::Tracer | Phase::Invalid => self.water_viscosity.value,
        }
    }

    /// Reject non-positive or non-finite properties.
    pub fn validate(&self) -> CapillaryResult<()> {
        let checks = [
            ("water viscosity", self.water_viscosity.value),
            ("oil viscosity", self.oil_viscosity.value),
            ("interfacial tension", self.interfacial_tension),
        ];
        for (what, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(CapillaryError::NonPhysical { what, value });
            }
        }
        if !self.tracer_diffusivity.is_finite() || self.tracer_diffusivity < 0.0 {
            return Err(CapillaryError::NonPhysical {
                what: "tracer diffusivity",
                value: self.tracer_diffusivity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_props_are_valid() {
        let props = FluidProps::default();
        assert!(props.validate().is_ok());
        assert_eq!(props.viscosity(Phase::Tracer), props.viscosity(Phase::Water));
    }

    #[test]
    fn negative_tension_rejected() {
        let props = FluidProps {
            interfacial_tension: -0.01,
            ..FluidProps::default()
        };
        assert!(matches!(
            props.validate(),
            Err(CapillaryError::NonPhysical { what: "interfacial tension", .. })
        ));
    }
}
