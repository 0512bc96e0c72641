//! API options for the Newton and CG iterations.
//!
//! This module provides the `SolverOptions` struct, which carries the
//! iteration limits and tolerances of the Newton–Krylov solve and the
//! finite-difference step used for Jacobian-vector products.

/// Step of the forward difference `(F(x + eps·v) − F(x)) / eps`.
pub const FD_EPS: f64 = 1e-8;

/// Newton–Krylov iteration parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverOptions {
    /// Maximum CG iterations per linear solve
    pub cg_max_iters: usize,

    /// Absolute tolerance on the CG residual norm
    pub cg_tol: f64,

    /// Maximum Newton iterations per time step
    pub newton_max_iters: usize,

    /// Absolute tolerance on the nonlinear residual norm
    pub newton_tol: f64,

    /// Finite-difference step for Jacobian-vector products
    pub fd_eps: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            cg_max_iters: 200,
            cg_tol: 1e-6,
            newton_max_iters: 50,
            newton_tol: 1e-6,
            fd_eps: FD_EPS,
        }
    }
}

impl SolverOptions {
    pub fn with_cg(mut self, max_iters: usize, tol: f64) -> Self {
        self.cg_max_iters = max_iters;
        self.cg_tol = tol;
        self
    }

    pub fn with_newton(mut self, max_iters: usize, tol: f64) -> Self {
        self.newton_max_iters = max_iters;
        self.newton_tol = tol;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let o = SolverOptions::default().with_cg(10, 1e-3).with_newton(4, 1e-5);
        assert_eq!((o.cg_max_iters, o.cg_tol), (10, 1e-3));
        assert_eq!((o.newton_max_iters, o.newton_tol), (4, 1e-5));
        assert_eq!(o.fd_eps, FD_EPS);
    }
}
