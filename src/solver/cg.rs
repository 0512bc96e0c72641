//! Matrix-free Conjugate Gradient for the Newton linear systems.
//!
//! The system matrix is the Jacobian of a nonlinear operator `F` at the
//! initial guess `x0`. It is never assembled: every product is the forward
//! difference `J v ≈ (F(x0 + eps·v) − F(x0)) / eps`, so one CG iteration
//! costs one operator evaluation. Dot products and norms go through an
//! [`InnerProduct`], which for distributed fields is a global all-reduce;
//! every rank therefore sees the same scalars and takes the same branches.

use crate::config::FD_EPS;
use crate::core::{Field, InnerProduct, NonlinearOperator};
use crate::error::JfnkError;
use crate::utils::convergence::{Convergence, SolveStats};

/// Working vectors, allocated once with the solver.
#[derive(Clone, Debug)]
struct CgScratch {
    ap: Field,
    r: Field,
    p: Field,
    fx: Field,
    fxold: Field,
    v: Field,
    xold: Field,
}

impl CgScratch {
    fn new(nx: usize, ny: usize) -> Self {
        let z = Field::zeros(nx, ny);
        Self {
            ap: z.clone(),
            r: z.clone(),
            p: z.clone(),
            fx: z.clone(),
            fxold: z.clone(),
            v: z.clone(),
            xold: z,
        }
    }
}

pub struct CgSolver {
    pub conv: Convergence<f64>,
    pub eps: f64,
    scratch: CgScratch,
}

impl CgSolver {
    /// Solver for `nx × ny` local fields.
    pub fn new(nx: usize, ny: usize, tol: f64, max_iters: usize) -> Self {
        Self {
            conv: Convergence::new(tol, max_iters),
            eps: FD_EPS,
            scratch: CgScratch::new(nx, ny),
        }
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Solve `J(x0)·x = b` in place, `x` holding `x0` on entry.
    ///
    /// Running out of iterations is not an error: the returned stats carry
    /// `converged == false` and the caller decides what to do. A zero or
    /// non-finite curvature or residual before convergence is a breakdown.
    pub fn solve<O, I>(&mut self, op: &mut O, ip: &I, b: &Field, x: &mut Field) -> Result<SolveStats<f64>, JfnkError>
    where
        O: NonlinearOperator<Field>,
        I: InnerProduct<Field, Scalar = f64>,
    {
        self.scratch.xold.ensure_same_shape(x)?;
        self.scratch.xold.ensure_same_shape(b)?;
        let _span = tracing::debug_span!("cg", n = x.len(), max_iters = self.conv.max_iters).entered();

        let eps = self.eps;
        let eps_inv = 1.0 / eps;
        let CgScratch { ap, r, p, fx, fxold, v, xold } = &mut self.scratch;

        xold.copy_from(x);
        op.apply(xold, fxold)?;
        v.scaled_copy(1.0 + eps, xold);
        op.apply(v, fx)?;

        // r = b - (Fx - Fxold)/eps
        ap.lcomb(eps_inv, fx, -eps_inv, fxold);
        r.lcomb(1.0, b, -1.0, ap);
        p.copy_from(r);

        let mut rold = ip.dot(r, r)?;
        let res0 = rold.sqrt();
        if !res0.is_finite() {
            return Err(JfnkError::Breakdown { iteration: 0, quantity: "initial residual" });
        }
        if self.conv.is_converged(res0) {
            tracing::debug!(iterations = 0, residual = res0, "CG converged");
            return Ok(SolveStats { iterations: 0, final_residual: res0, converged: true });
        }

        let mut stats = SolveStats { iterations: 0, final_residual: res0, converged: false };
        for i in 1..=self.conv.max_iters {
            // Ap = (F(xold + eps p) - F(xold)) / eps
            v.lcomb(1.0, xold, eps, p);
            op.apply(v, fx)?;
            ap.lcomb(eps_inv, fx, -eps_inv, fxold);

            let pap = ip.dot(p, ap)?;
            if pap == 0.0 || !pap.is_finite() {
                return Err(JfnkError::Breakdown { iteration: i, quantity: "p·Ap" });
            }
            let alpha = rold / pap;

            x.axpy(alpha, p);
            r.axpy(-alpha, ap);
            let rnew = ip.dot(r, r)?;
            if !rnew.is_finite() {
                return Err(JfnkError::Breakdown { iteration: i, quantity: "r·r" });
            }

            let (stop, s) = self.conv.check(rnew.sqrt(), i);
            stats = s;
            if stop {
                break;
            }
            if rold == 0.0 {
                return Err(JfnkError::Breakdown { iteration: i, quantity: "r·r of the previous iteration" });
            }
            // p = r + (rnew/rold) p
            p.xpby(r, rnew / rold);
            rold = rnew;
        }

        if stats.converged {
            tracing::debug!(iterations = stats.iterations, residual = stats.final_residual, "CG converged");
        } else {
            tracing::warn!(
                iterations = stats.iterations,
                residual = stats.final_residual,
                tol = self.conv.tol,
                "CG failed to converge"
            );
        }
        Ok(stats)
    }
}
