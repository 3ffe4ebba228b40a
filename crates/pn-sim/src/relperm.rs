//! Relative permeability from per-phase pressure solves.

use pn_capillary::{assign_phase, assign_single_phase};
use pn_network::{Network, Phase};
use pn_solver::solve_pressure;
use tracing::debug;

use crate::connectivity::{cluster_phase_continuity, continuity_slot};
use crate::context::SimContext;
use crate::error::{SimError, SimResult};

/// Relative permeabilities at one saturation state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelPerm {
    pub krw: f64,
    pub kro: f64,
}

/// Computes kr = Q_phase·μ_phase / (Q_single·μ_single) at a unit pressure drop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelPermEvaluator {
    /// Q·μ of the fully water-saturated network
    reference: f64,
}

impl RelPermEvaluator {
    /// Solve the single-phase reference flow.
    pub fn new(network: &mut Network, ctx: &SimContext) -> SimResult<Self> {
        let mu = ctx.fluids.viscosity(Phase::Water);
        assign_single_phase(network, mu);
        let solution = solve_pressure(network, &ctx.unit_drop_problem())?;
        let reference = solution.total_flow() * mu;
        if !reference.is_finite() || reference <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "no conductive path between inlet and outlet for the reference flow",
            });
        }
        debug!(reference, "single-phase reference flow");
        Ok(Self { reference })
    }

    pub fn reference(&self) -> f64 {
        self.reference
    }

    /// Relative permeability of both phases in the current state.
    pub fn evaluate(&self, network: &mut Network, ctx: &SimContext) -> SimResult<RelPerm> {
        Ok(RelPerm {
            krw: self.phase(network, Phase::Water, ctx)?,
            kro: self.phase(network, Phase::Oil, ctx)?,
        })
    }

    fn phase(&self, network: &mut Network, phase: Phase, ctx: &SimContext) -> SimResult<f64> {
        cluster_phase_continuity(network, phase);
        let slot = continuity_slot(phase);
        let spanning: Vec<bool> = network
            .elements()
            .iter()
            .map(|e| network.cluster_of(e.abs_id, slot).is_some_and(|c| c.spanning()))
            .collect();
        if !spanning.iter().any(|s| *s) {
            return Ok(0.0);
        }

        assign_phase(network, phase, &ctx.fluids, |e| spanning[e.abs_id.idx()]);
        let solution = solve_pressure(network, &ctx.unit_drop_problem())?;
        let kr = solution.total_flow() * ctx.fluids.viscosity(phase) / self.reference;
        Ok(kr.max(0.0))
    }
}
