//! Pressure problem definition.

/// Boundary condition across the inlet and outlet faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryCondition {
    /// Fixed pressures on both faces (Pa).
    PressureDrop { inlet: f64, outlet: f64 },
    /// Fixed total flow rate (m³/s) with the outlet held at `outlet` Pa.
    FlowRate { rate: f64, outlet: f64 },
}

impl BoundaryCondition {
    /// Reference pressure given to nodes cut off from both faces.
    pub fn reference_pressure(&self) -> f64 {
        match *self {
            BoundaryCondition::PressureDrop { outlet, .. } => outlet,
            BoundaryCondition::FlowRate { outlet, .. } => outlet,
        }
    }
}

impl Default for BoundaryCondition {
    fn default() -> Self {
        BoundaryCondition::PressureDrop {
            inlet: 1.0,
            outlet: 0.0,
        }
    }
}

/// Linear solver back-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinearSolverKind {
    /// Dense Cholesky factorization (small networks)
    Cholesky,
    /// Jacobi-preconditioned conjugate gradient
    #[default]
    ConjugateGradient,
}

/// Conjugate-gradient settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CgConfig {
    /// Relative tolerance on ‖r‖/‖b‖
    pub rtol: f64,
    /// Absolute tolerance on ‖r‖ of the normalized system
    pub atol: f64,
    pub max_iter: usize,
}

impl Default for CgConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-13,
            atol: 1e-30,
            max_iter: 20_000,
        }
    }
}

/// Pressure solve configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverConfig {
    pub method: LinearSolverKind,
    pub cg: CgConfig,
}

/// A pressure problem: boundary condition plus solver settings.
///
/// Element conductivities and active flags are read from the network.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PressureProblem {
    pub boundary: BoundaryCondition,
    pub config: SolverConfig,
}

impl PressureProblem {
    pub fn new(boundary: BoundaryCondition, config: SolverConfig) -> Self {
        Self { boundary, config }
    }
}
