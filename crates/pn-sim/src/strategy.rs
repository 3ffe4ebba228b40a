//! Displacement strategies driven by the invasion skeleton.
//!
//! Each strategy fixes the invading phase, the direction of the capillary
//! pressure sweep and the entry/snap-off thresholds it honours.

use pn_capillary::{oil_snap_off_pressure, piston_entry_pressure, water_snap_off_pressure};
use pn_network::{Element, Phase, Wettability};

/// Direction in which the imposed capillary pressure moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// Pc increases; oil invades when Pc ≥ threshold
    Rising,
    /// Pc decreases; water invades when Pc ≤ threshold
    Falling,
}

impl Sweep {
    /// True once `pc` has reached `threshold`.
    pub fn crossed(self, pc: f64, threshold: f64) -> bool {
        match self {
            Sweep::Rising => pc >= threshold,
            Sweep::Falling => pc <= threshold,
        }
    }

    /// True if `threshold` still lies strictly ahead of `pc`.
    pub fn ahead(self, pc: f64, threshold: f64) -> bool {
        !self.crossed(pc, threshold)
    }

    /// Move `pc` by `increment` toward `end`, never past it.
    pub fn advance(self, pc: f64, increment: f64, end: f64) -> f64 {
        match self {
            Sweep::Rising => (pc + increment).min(end),
            Sweep::Falling => (pc - increment).max(end),
        }
    }

    /// The nearer of two pressures along the sweep.
    pub fn nearer(self, a: f64, b: f64) -> f64 {
        match self {
            Sweep::Rising => a.min(b),
            Sweep::Falling => a.max(b),
        }
    }
}

/// Strategy plugged into the invasion skeleton.
pub trait Displacement: Send + Sync {
    fn name(&self) -> &'static str;

    fn invading(&self) -> Phase;

    fn displaced(&self) -> Phase {
        self.invading().opposite()
    }

    fn sweep(&self) -> Sweep;

    /// Starting capillary pressure for a sweep bounded by `max_pc` in magnitude.
    fn start_pressure(&self, max_pc: f64) -> f64;

    /// Extreme capillary pressure of the sweep.
    fn end_pressure(&self, max_pc: f64) -> f64;

    /// Piston-like entry threshold of an element holding the displaced phase,
    /// or `None` if this displacement never fills it by piston motion.
    fn entry_pressure(&self, element: &Element, sigma: f64) -> Option<f64>;

    /// Snap-off threshold for a pore; only imbibition-type strategies have one.
    fn snap_off_pressure(&self, _element: &Element, _sigma: f64) -> Option<f64> {
        None
    }

    /// Whether water saturation `sw` satisfies the target of this displacement.
    fn target_reached(&self, sw: f64, target: f64) -> bool {
        match self.invading() {
            Phase::Oil => sw <= target,
            _ => sw >= target,
        }
    }
}

fn piston(element: &Element, sigma: f64) -> f64 {
    piston_entry_pressure(&element.geometry, sigma, element.state.contact_angle)
}

/// Oil drives water out of an initially water-saturated network.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryDrainage;

impl Displacement for PrimaryDrainage {
    fn name(&self) -> &'static str {
        "primary drainage"
    }

    fn invading(&self) -> Phase {
        Phase::Oil
    }

    fn sweep(&self) -> Sweep {
        Sweep::Rising
    }

    fn start_pressure(&self, _max_pc: f64) -> f64 {
        0.0
    }

    fn end_pressure(&self, max_pc: f64) -> f64 {
        max_pc
    }

    fn entry_pressure(&self, element: &Element, sigma: f64) -> Option<f64> {
        Some(piston(element, sigma))
    }
}

/// Water re-enters water-wet elements while Pc falls to zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpontaneousImbibition;

impl Displacement for SpontaneousImbibition {
    fn name(&self) -> &'static str {
        "spontaneous imbibition"
    }

    fn invading(&self) -> Phase {
        Phase::Water
    }

    fn sweep(&self) -> Sweep {
        Sweep::Falling
    }

    fn start_pressure(&self, max_pc: f64) -> f64 {
        max_pc
    }

    fn end_pressure(&self, _max_pc: f64) -> f64 {
        0.0
    }

    fn entry_pressure(&self, element: &Element, sigma: f64) -> Option<f64> {
        let pc = piston(element, sigma);
        (pc > 0.0).then_some(pc)
    }

    fn snap_off_pressure(&self, element: &Element, sigma: f64) -> Option<f64> {
        water_snap_off(element, sigma).filter(|pc| *pc > 0.0)
    }
}

/// Water is forced into oil-wet elements at negative Pc.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForcedWaterInjection;

impl Displacement for ForcedWaterInjection {
    fn name(&self) -> &'static str {
        "forced water injection"
    }

    fn invading(&self) -> Phase {
        Phase::Water
    }

    fn sweep(&self) -> Sweep {
        Sweep::Falling
    }

    fn start_pressure(&self, _max_pc: f64) -> f64 {
        0.0
    }

    fn end_pressure(&self, max_pc: f64) -> f64 {
        -max_pc
    }

    fn entry_pressure(&self, element: &Element, sigma: f64) -> Option<f64> {
        Some(piston(element, sigma))
    }

    fn snap_off_pressure(&self, element: &Element, sigma: f64) -> Option<f64> {
        water_snap_off(element, sigma)
    }
}

/// Oil re-enters oil-wet elements while Pc rises back to zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpontaneousOilInvasion;

impl Displacement for SpontaneousOilInvasion {
    fn name(&self) -> &'static str {
        "spontaneous oil invasion"
    }

    fn invading(&self) -> Phase {
        Phase::Oil
    }

    fn sweep(&self) -> Sweep {
        Sweep::Rising
    }

    fn start_pressure(&self, max_pc: f64) -> f64 {
        -max_pc
    }

    fn end_pressure(&self, _max_pc: f64) -> f64 {
        0.0
    }

    fn entry_pressure(&self, element: &Element, sigma: f64) -> Option<f64> {
        let pc = piston(element, sigma);
        (pc < 0.0).then_some(pc)
    }

    fn snap_off_pressure(&self, element: &Element, sigma: f64) -> Option<f64> {
        if element.state.wettability != Wettability::OilWet {
            return None;
        }
        oil_snap_off_pressure(&element.geometry, sigma, element.state.contact_angle)
    }
}

/// Oil is forced back in at positive Pc after an imbibition cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecondaryDrainage;

impl Displacement for SecondaryDrainage {
    fn name(&self) -> &'static str {
        "secondary drainage"
    }

    fn invading(&self) -> Phase {
        Phase::Oil
    }

    fn sweep(&self) -> Sweep {
        Sweep::Rising
    }

    fn start_pressure(&self, _max_pc: f64) -> f64 {
        0.0
    }

    fn end_pressure(&self, max_pc: f64) -> f64 {
        max_pc
    }

    fn entry_pressure(&self, element: &Element, sigma: f64) -> Option<f64> {
        Some(piston(element, sigma))
    }
}

fn water_snap_off(element: &Element, sigma: f64) -> Option<f64> {
    if element.state.wettability != Wettability::WaterWet {
        return None;
    }
    water_snap_off_pressure(&element.geometry, sigma, element.state.contact_angle)
}

/// The five displacement cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplacementKind {
    PrimaryDrainage,
    SpontaneousImbibition,
    ForcedWaterInjection,
    SpontaneousOilInvasion,
    SecondaryDrainage,
}

/// Strategy object for `kind`.
pub fn displacement(kind: DisplacementKind) -> Box<dyn Displacement> {
    match kind {
        DisplacementKind::PrimaryDrainage => Box::new(PrimaryDrainage),
        DisplacementKind::SpontaneousImbibition => Box::new(SpontaneousImbibition),
        DisplacementKind::ForcedWaterInjection => Box::new(ForcedWaterInjection),
        DisplacementKind::SpontaneousOilInvasion => Box::new(SpontaneousOilInvasion),
        DisplacementKind::SecondaryDrainage => Box::new(SecondaryDrainage),
    }
}
