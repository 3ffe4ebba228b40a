//! Conductance-network pressure solver for porenet.
//!
//! Assembles nodal mass balance over the active, boundary-connected part of
//! a pore network and solves it with a dense Cholesky factorization or a
//! Jacobi-preconditioned conjugate gradient. Pore flows, node pressures and
//! node throughputs are written back into the network.

mod assembly;
pub mod csr;
pub mod error;
pub mod linear;
pub mod problem;
pub mod solve;

pub use csr::{CsrBuilder, CsrMatrix};
pub use error::{SolverError, SolverResult};
pub use linear::{DenseCholesky, JacobiCg, LinearSolution, LinearSolver, linear_solver};
pub use problem::{BoundaryCondition, CgConfig, LinearSolverKind, PressureProblem, SolverConfig};
pub use solve::{FlowSolution, node_net_flows, solve_pressure};
