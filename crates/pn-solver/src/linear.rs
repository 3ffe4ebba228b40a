//! Linear solver back-ends for the symmetric pressure system.

use nalgebra::DVector;

use crate::csr::CsrMatrix;
use crate::error::{SolverError, SolverResult};
use crate::problem::{CgConfig, LinearSolverKind, SolverConfig};

/// Outcome of a linear solve.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSolution {
    pub x: Vec<f64>,
    pub iterations: usize,
    /// ‖b − A·x‖ / ‖b‖
    pub relative_residual: f64,
}

/// A solver for symmetric positive-definite systems.
pub trait LinearSolver {
    fn solve(&self, a: &CsrMatrix, b: &[f64], x0: &[f64]) -> SolverResult<LinearSolution>;
}

/// Dense Cholesky factorization through nalgebra.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseCholesky;

/// Conjugate gradient with a diagonal (Jacobi) preconditioner.
#[derive(Debug, Clone, Copy, Default)]
pub struct JacobiCg {
    pub config: CgConfig,
}

impl LinearSolver for DenseCholesky {
    fn solve(&self, a: &CsrMatrix, b: &[f64], _x0: &[f64]) -> SolverResult<LinearSolution> {
        let chol = a
            .to_dense()
            .cholesky()
            .ok_or(SolverError::NotPositiveDefinite)?;
        let x = chol.solve(&DVector::from_column_slice(b));
        let x: Vec<f64> = x.iter().copied().collect();
        let relative_residual = relative_residual(a, b, &x);
        Ok(LinearSolution {
            x,
            iterations: 1,
            relative_residual,
        })
    }
}

impl LinearSolver for JacobiCg {
    fn solve(&self, a: &CsrMatrix, b: &[f64], x0: &[f64]) -> SolverResult<LinearSolution> {
        let n = a.dimension();
        let cfg = &self.config;
        let mut x = x0.to_vec();

        let inv_diag: Vec<f64> = a
            .diagonal()
            .iter()
            .map(|&d| if d > 0.0 { 1.0 / d } else { 1.0 })
            .collect();

        // r = b - A x
        let mut r = vec![0.0; n];
        a.mul_vec(&x, &mut r);
        for i in 0..n {
            r[i] = b[i] - r[i];
        }

        let b_norm = norm(b);
        if b_norm == 0.0 {
            return Ok(LinearSolution {
                x: vec![0.0; n],
                iterations: 0,
                relative_residual: 0.0,
            });
        }

        let mut z: Vec<f64> = r.iter().zip(&inv_diag).map(|(ri, di)| ri * di).collect();
        let mut p = z.clone();
        let mut ap = vec![0.0; n];
        let mut rho = dot(&r, &z);

        for iter in 0..cfg.max_iter {
            let r_norm = norm(&r);
            if r_norm <= cfg.rtol * b_norm || r_norm <= cfg.atol {
                return Ok(LinearSolution {
                    x,
                    iterations: iter,
                    relative_residual: r_norm / b_norm,
                });
            }

            a.mul_vec(&p, &mut ap);
            let p_ap = dot(&p, &ap);
            if p_ap <= 0.0 {
                return Err(SolverError::NotPositiveDefinite);
            }
            let alpha = rho / p_ap;
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }

            for i in 0..n {
                z[i] = r[i] * inv_diag[i];
            }
            let rho_next = dot(&r, &z);
            let beta = rho_next / rho;
            rho = rho_next;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }

        Err(SolverError::ConvergenceFailed {
            iterations: cfg.max_iter,
            residual: norm(&r) / b_norm,
        })
    }
}

/// Back-end selected by `config`.
pub fn linear_solver(config: &SolverConfig) -> Box<dyn LinearSolver> {
    match config.method {
        LinearSolverKind::Cholesky => Box::new(DenseCholesky),
        LinearSolverKind::ConjugateGradient => Box::new(JacobiCg { config: config.cg }),
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

fn relative_residual(a: &CsrMatrix, b: &[f64], x: &[f64]) -> f64 {
    let mut ax = vec![0.0; x.len()];
    a.mul_vec(x, &mut ax);
    let r: Vec<f64> = b.iter().zip(&ax).map(|(bi, axi)| bi - axi).collect();
    let b_norm = norm(b);
    if b_norm > 0.0 { norm(&r) / b_norm } else { norm(&r) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::CsrBuilder;

    /// 1D Laplacian with Dirichlet ends: [2 -1; -1 2 -1; ...].
    fn laplacian(n: usize) -> CsrMatrix {
        let mut b = CsrBuilder::new(n);
        for i in 0..n - 1 {
            b.add_link(i, i + 1, 1.0);
        }
        b.add(0, 0, 1.0);
        b.add(n - 1, n - 1, 1.0);
        b.build()
    }

    #[test]
    fn cholesky_and_cg_agree() {
        let a = laplacian(8);
        let mut rhs = vec![0.0; 8];
        rhs[0] = 1.0;
        let x0 = vec![0.0; 8];

        let direct = DenseCholesky.solve(&a, &rhs, &x0).unwrap();
        let iterative = JacobiCg::default().solve(&a, &rhs, &x0).unwrap();
        for (d, i) in direct.x.iter().zip(&iterative.x) {
            assert!((d - i).abs() < 1e-10);
        }
        // Linear pressure profile from 1 toward 0.
        assert!((direct.x[0] - 8.0 / 9.0).abs() < 1e-12);
        assert!(iterative.relative_residual < 1e-12);
    }

    #[test]
    fn singular_matrix_rejected_by_cholesky() {
        let mut b = CsrBuilder::new(2);
        b.add_link(0, 1, 1.0);
        let a = b.build();
        assert_eq!(
            DenseCholesky.solve(&a, &[1.0, -1.0], &[0.0, 0.0]),
            Err(SolverError::NotPositiveDefinite)
        );
    }

    #[test]
    fn cg_reports_non_convergence() {
        let a = laplacian(50);
        let mut rhs = vec![0.0; 50];
        rhs[0] = 1.0;
        let cg = JacobiCg {
            config: CgConfig {
                max_iter: 2,
                ..CgConfig::default()
            },
        };
        assert!(matches!(
            cg.solve(&a, &rhs, &vec![0.0; 50]),
            Err(SolverError::ConvergenceFailed { iterations: 2, .. })
        ));
    }
}
