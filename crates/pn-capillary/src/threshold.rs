//! Capillary entry and snap-off thresholds.
//!
//! Sign convention: Pc = P_oil − P_water. Oil invades an element when the
//! imposed Pc rises to its entry value, water invades when Pc falls to it.

use std::f64::consts::{FRAC_PI_4, PI};

use pn_network::Geometry;

use crate::error::{CapillaryError, CapillaryResult};

/// Largest contact angle for which a wetting film can snap off a throat.
pub const SNAP_OFF_MAX_ANGLE: f64 = FRAC_PI_4;

/// Piston-like entry pressure σ·cosθ·(1 + 2√(πG))/r.
///
/// Positive for water-wet angles (θ < π/2), negative for oil-wet ones.
pub fn piston_entry_pressure(geometry: &Geometry, sigma: f64, theta: f64) -> f64 {
    let g = geometry.shape_factor;
    sigma * theta.cos() * (1.0 + 2.0 * (PI * g).sqrt()) / geometry.radius
}

/// Snap-off pressure for water swelling out of corners, σ(cosθ − sinθ)/r.
///
/// `None` for circular cross-sections and for θ ≥ π/4 where the corner
/// films cannot meet.
pub fn water_snap_off_pressure(geometry: &Geometry, sigma: f64, theta: f64) -> Option<f64> {
    if !geometry.shape().has_corners() || theta >= SNAP_OFF_MAX_ANGLE {
        return None;
    }
    Some(sigma * (theta.cos() - theta.sin()) / geometry.radius)
}

/// Snap-off pressure for oil swelling out of oil-wet corners, σ(cosθ + sinθ)/r.
///
/// Mirror of [`water_snap_off_pressure`] with θ measured through water; only
/// defined when π − θ < π/4.
pub fn oil_snap_off_pressure(geometry: &Geometry, sigma: f64, theta: f64) -> Option<f64> {
    if !geometry.shape().has_corners() || PI - theta >= SNAP_OFF_MAX_ANGLE {
        return None;
    }
    Some(sigma * (theta.cos() + theta.sin()) / geometry.radius)
}

pub fn check_contact_angle(theta: f64) -> CapillaryResult<()> {
    if theta.is_finite() && (0.0..=PI).contains(&theta) {
        Ok(())
    } else {
        Err(CapillaryError::ContactAngle { value: theta })
    }
}
