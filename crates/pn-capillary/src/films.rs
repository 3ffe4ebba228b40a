//! Wetting films held in the corners of angular elements.

use std::f64::consts::FRAC_PI_2;

use pn_network::{Element, Geometry, Network, Phase, Wettability};
use rayon::prelude::*;

use crate::fluids::FluidProps;

/// Default dimensionless corner flow resistance.
pub const DEFAULT_CORNER_RESISTANCE: f64 = 60.0;

/// Area held in the corners at capillary pressure magnitude `pc_abs`.
///
/// `theta` is the contact angle measured through the wetting phase. Each
/// corner of half-angle β contributes
/// `r_c²·[cosθ·cos(θ+β)/sinβ − (π/2 − θ − β)]` with `r_c = σ/|Pc|`, provided
/// θ < π/2 − β. The result never exceeds the bulk area.
pub fn corner_area(geometry: &Geometry, theta: f64, pc_abs: f64, sigma: f64) -> f64 {
    if pc_abs <= 0.0 {
        return 0.0;
    }
    let rc = sigma / pc_abs;
    let per_rc2: f64 = geometry
        .shape()
        .corner_half_angles()
        .iter()
        .filter(|beta| theta < FRAC_PI_2 - **beta)
        .map(|&beta| theta.cos() * (theta + beta).cos() / beta.sin() - (FRAC_PI_2 - theta - beta))
        .sum();
    (rc * rc * per_rc2).clamp(0.0, geometry.area())
}

/// Film conductance A_c²/(k_f·μ·L).
pub fn film_conductance(corner_area: f64, length: f64, viscosity: f64, resistance: f64) -> f64 {
    if corner_area <= 0.0 {
        return 0.0;
    }
    corner_area * corner_area / (resistance * viscosity * length)
}

/// Contact angle seen by the wetting phase of `element`.
fn wetting_angle(element: &Element) -> f64 {
    match element.state.wettability {
        Wettability::OilWet => std::f64::consts::PI - element.state.contact_angle,
        _ => element.state.contact_angle,
    }
}

/// Drop any film bookkeeping on `element`.
pub fn clear_films(element: &mut Element) {
    let s = &mut element.state;
    s.oil_film_volume = 0.0;
    s.water_film_volume = 0.0;
    s.oil_film_conductivity = 0.0;
    s.water_film_conductivity = 0.0;
}

/// Recompute corner films of one element at capillary pressure `pc`.
///
/// Only elements whose bulk holds the non-wetting phase with a consistent
/// sign of `pc` are touched; the others keep their previous (hinged) state.
/// Returns true if the element changed.
pub fn update_element_films(element: &mut Element, pc: f64, fluids: &FluidProps, resistance: f64) -> bool {
    if !element.is_open() || !element.geometry.shape().has_corners() {
        return false;
    }
    let wetting = element.state.wettability.wetting_phase();
    let bulk = match element.state.phase {
        Phase::Tracer => Phase::Water,
        p => p,
    };
    let consistent = match (wetting, bulk) {
        (Phase::Water, Phase::Oil) => pc > 0.0,
        (Phase::Oil, Phase::Water) => pc < 0.0,
        _ => false,
    };
    if !consistent {
        return false;
    }

    let area = element.geometry.area();
    let ac = corner_area(&element.geometry, wetting_angle(element), pc.abs(), fluids.interfacial_tension);
    let fraction = ac / area;
    let volume = ac * element.geometry.length;
    let conductance = film_conductance(
        ac,
        element.geometry.length,
        fluids.viscosity(wetting),
        resistance,
    );

    clear_films(element);
    let s = &mut element.state;
    match wetting {
        Phase::Water => {
            s.water_fraction = fraction;
            s.oil_fraction = 1.0 - fraction;
            s.water_film_volume = volume;
            s.water_film_conductivity = conductance;
        }
        _ => {
            s.oil_fraction = fraction;
            s.water_fraction = 1.0 - fraction;
            s.oil_film_volume = volume;
            s.oil_film_conductivity = conductance;
        }
    }
    true
}

/// Recompute corner films across the network. Returns the number of updated elements.
pub fn update_films(network: &mut Network, pc: f64, fluids: &FluidProps, resistance: f64) -> usize {
    network
        .elements_mut()
        .par_iter_mut()
        .map(|e| usize::from(update_element_films(e, pc, fluids, resistance)))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pn_network::element::{CIRCLE_SHAPE_FACTOR, SQUARE_SHAPE_FACTOR};

    #[test]
    fn square_corner_area_at_zero_angle() {
        let g = Geometry::new(1e-5, 1e-4, SQUARE_SHAPE_FACTOR);
        let sigma = 0.03;
        let pc = 3.0 * sigma / 1e-5;
        let rc = sigma / pc;
        let expected = (4.0 - std::f64::consts::PI) * rc * rc;
        assert!((corner_area(&g, 0.0, pc, sigma) - expected).abs() < 1e-20);
    }

    #[test]
    fn circles_hold_no_films() {
        let g = Geometry::new(1e-5, 1e-4, CIRCLE_SHAPE_FACTOR);
        assert_eq!(corner_area(&g, 0.0, 1e4, 0.03), 0.0);
    }

    #[test]
    fn corner_area_capped_at_bulk() {
        let g = Geometry::new(1e-5, 1e-4, SQUARE_SHAPE_FACTOR);
        assert!((corner_area(&g, 0.0, 1.0, 0.03) - g.area()).abs() < 1e-24);
    }

    #[test]
    fn large_angle_has_no_film() {
        let g = Geometry::new(1e-5, 1e-4, SQUARE_SHAPE_FACTOR);
        assert_eq!(corner_area(&g, 1.0, 1e4, 0.03), 0.0);
    }

    #[test]
    fn film_conductance_scales_with_area_squared() {
        let a = film_conductance(1e-12, 1e-4, 1e-3, DEFAULT_CORNER_RESISTANCE);
        let b = film_conductance(2e-12, 1e-4, 1e-3, DEFAULT_CORNER_RESISTANCE);
        assert!((b / a - 4.0).abs() < 1e-12);
        assert_eq!(film_conductance(0.0, 1e-4, 1e-3, 1.0), 0.0);
    }
}
