//! Immutable settings shared by every stage of a run.

use pn_capillary::{DEFAULT_CORNER_RESISTANCE, FluidProps};
use pn_solver::{BoundaryCondition, PressureProblem, SolverConfig};

/// Physics and numerics threaded through the stages.
#[derive(Debug, Clone, PartialEq)]
pub struct SimContext {
    pub fluids: FluidProps,
    pub solver: SolverConfig,
    /// Boundary condition for flow computations (transport, unsteady flooding)
    pub boundary: BoundaryCondition,
    /// Dimensionless corner flow resistance for film conductance
    pub corner_resistance: f64,
}

impl Default for SimContext {
    fn default() -> Self {
        Self {
            fluids: FluidProps::default(),
            solver: SolverConfig::default(),
            boundary: BoundaryCondition::default(),
            corner_resistance: DEFAULT_CORNER_RESISTANCE,
        }
    }
}

impl SimContext {
    /// Pressure problem under the configured boundary condition.
    pub fn flow_problem(&self) -> PressureProblem {
        PressureProblem::new(self.boundary, self.solver)
    }

    /// Pressure problem under a unit pressure drop, used for conductance ratios.
    pub fn unit_drop_problem(&self) -> PressureProblem {
        PressureProblem::new(
            BoundaryCondition::PressureDrop {
                inlet: 1.0,
                outlet: 0.0,
            },
            self.solver,
        )
    }
}
