//! Hydraulic conductance of capillary elements.

use pn_network::{Element, Geometry, Network, Phase};
use rayon::prelude::*;

use crate::fluids::FluidProps;

/// Single-phase conductance g = k·A²·G/(μ·L).
pub fn bulk_conductance(geometry: &Geometry, viscosity: f64) -> f64 {
    let area = geometry.area();
    geometry.shape_factor_constant * area * area * geometry.shape_factor
        / (viscosity * geometry.length)
}

/// Conductance of an element filled with a water/oil mixture, using the
/// saturation-weighted viscosity Sw·μw + So·μo.
pub fn mixture_conductance(geometry: &Geometry, water_fraction: f64, fluids: &FluidProps) -> f64 {
    let mu = water_fraction * fluids.viscosity(Phase::Water)
        + (1.0 - water_fraction) * fluids.viscosity(Phase::Oil);
    bulk_conductance(geometry, mu)
}

/// Conductance of `phase` through `element`: bulk if the phase fills the
/// element, its corner film otherwise.
pub fn phase_conductance(element: &Element, phase: Phase, fluids: &FluidProps) -> f64 {
    let bulk = match element.state.phase {
        Phase::Tracer => Phase::Water,
        p => p,
    };
    if bulk == phase {
        bulk_conductance(&element.geometry, fluids.viscosity(phase))
    } else {
        element.state.film_conductivity(phase)
    }
}

/// Set every open element active with its single-phase conductance.
pub fn assign_single_phase(network: &mut Network, viscosity: f64) {
    network
        .elements_mut()
        .par_iter_mut()
        .filter(|e| e.is_open())
        .for_each(|e| {
            e.state.conductivity = bulk_conductance(&e.geometry, viscosity);
            e.state.active = true;
        });
}

/// Set per-element conductances for a `phase` flow computation.
///
/// Elements rejected by `connected` are deactivated with zero conductance.
pub fn assign_phase<F>(network: &mut Network, phase: Phase, fluids: &FluidProps, connected: F)
where
    F: Fn(&Element) -> bool + Sync,
{
    network
        .elements_mut()
        .par_iter_mut()
        .filter(|e| e.is_open())
        .for_each(|e| {
            let g = if connected(e) {
                phase_conductance(e, phase, fluids)
            } else {
                0.0
            };
            e.state.conductivity = g;
            e.state.active = g > 0.0;
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pn_network::element::CIRCLE_SHAPE_FACTOR;
    use std::f64::consts::PI;

    #[test]
    fn circle_matches_poiseuille() {
        let g = Geometry::new(1e-5, 1e-4, CIRCLE_SHAPE_FACTOR);
        let mu = 1e-3;
        let expected = PI * 1e-20 / (8.0 * mu * 1e-4);
        let actual = bulk_conductance(&g, mu);
        assert!((actual - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn mixture_interpolates_viscosity() {
        let g = Geometry::new(1e-5, 1e-4, CIRCLE_SHAPE_FACTOR);
        let fluids = FluidProps {
            oil_viscosity: pn_core::units::pa_s(4e-3),
            ..FluidProps::default()
        };
        let water = mixture_conductance(&g, 1.0, &fluids);
        let oil = mixture_conductance(&g, 0.0, &fluids);
        assert!((water / oil - 4.0).abs() < 1e-12);
        let half = mixture_conductance(&g, 0.5, &fluids);
        assert!(half < water && half > oil);
    }
}
