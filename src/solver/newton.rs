//! Newton iteration for one implicit time step.
//!
//! Each iteration evaluates the residual `F(x_new)`, stops once its global
//! norm is below tolerance, and otherwise solves `J(x_new)·δ = F(x_new)` with
//! the matrix-free CG before updating `x_new ← x_new − δ`.
//!
//! CG linearizes at its own initial guess, which is zero for the correction.
//! [`ShiftedOperator`] moves that point to `x_new` by evaluating
//! `G(v) = F(x_new + v)`, whose Jacobian at `v = 0` is `J(x_new)`.

use crate::context::ProcessContext;
use crate::core::{DistributedInnerProduct, Field, InnerProduct, NonlinearOperator};
use crate::error::JfnkError;
use crate::operator::DiffusionOperator;
use crate::parallel::Comm;
use crate::utils::convergence::{Convergence, SolveStats};

/// `v ↦ F(base + v)`.
pub struct ShiftedOperator<'a, O> {
    inner: &'a mut O,
    base: &'a Field,
    point: &'a mut Field,
}

impl<'a, O> ShiftedOperator<'a, O> {
    /// `point` is scratch storage shaped like `base`.
    pub fn new(inner: &'a mut O, base: &'a Field, point: &'a mut Field) -> Self {
        Self { inner, base, point }
    }
}

impl<O: NonlinearOperator<Field>> NonlinearOperator<Field> for ShiftedOperator<'_, O> {
    fn apply(&mut self, v: &Field, out: &mut Field) -> Result<(), JfnkError> {
        self.base.ensure_same_shape(v)?;
        self.point.lcomb(1.0, self.base, 1.0, v);
        self.inner.apply(&*self.point, out)
    }
}

pub struct NewtonSolver {
    pub conv: Convergence<f64>,
    pub cg_max_iters: usize,
    pub cg_tol: f64,
    residual: Field,
    delta: Field,
    point: Field,
}

impl NewtonSolver {
    /// Solver sized and configured for the given context.
    pub fn new<C: Comm>(ctx: &ProcessContext<C>) -> Self {
        let o = &ctx.options;
        Self {
            conv: Convergence::new(o.newton_tol, o.newton_max_iters),
            cg_max_iters: o.cg_max_iters,
            cg_tol: o.cg_tol,
            residual: ctx.zeros(),
            delta: ctx.zeros(),
            point: ctx.zeros(),
        }
    }

    /// Last residual `F(x_new)` evaluated by [`step`](Self::step).
    pub fn residual(&self) -> &Field {
        &self.residual
    }

    /// Advance `ctx.x_new` to the solution of the current time level, with
    /// `ctx.x_old` holding the previous one. Collective.
    ///
    /// `iterations` counts Newton corrections applied. A CG solve that runs
    /// out of iterations ends the step with `converged == false`; so does
    /// exhausting the Newton iterations.
    pub fn step<C: Comm>(&mut self, ctx: &mut ProcessContext<C>) -> Result<SolveStats<f64>, JfnkError> {
        let _span = tracing::info_span!("newton", rank = ctx.comm.rank()).entered();
        let ProcessContext {
            comm,
            discretization,
            subdomain,
            halo,
            x_new,
            x_old,
            cg,
            stats,
            ..
        } = ctx;
        cg.conv = Convergence::new(self.cg_tol, self.cg_max_iters);
        let ip = DistributedInnerProduct::new(&*comm);

        let mut result = SolveStats { iterations: 0, final_residual: f64::INFINITY, converged: false };
        for it in 0..=self.conv.max_iters {
            let mut op = DiffusionOperator::new(&*comm, &*subdomain, &*discretization, &*x_old, &mut *halo, &mut *stats);
            op.evaluate(x_new, &mut self.residual)?;
            let res = ip.norm(&self.residual)?;
            if !res.is_finite() {
                return Err(JfnkError::Breakdown { iteration: it, quantity: "Newton residual" });
            }
            result = SolveStats { iterations: it, final_residual: res, converged: self.conv.is_converged(res) };
            tracing::debug!(iteration = it, residual = res, "newton residual");
            if result.converged || it == self.conv.max_iters {
                break;
            }

            self.delta.fill(0.0);
            let lin = {
                let mut shifted = ShiftedOperator::new(&mut op, &*x_new, &mut self.point);
                cg.solve(&mut shifted, &ip, &self.residual, &mut self.delta)?
            };
            stats.add_cg_iterations(lin.iterations);
            if !lin.converged {
                tracing::warn!(iteration = it, "CG failed to converge, abandoning Newton step");
                stats.add_newton_iterations(it);
                return Ok(result);
            }
            x_new.axpy(-1.0, &self.delta);
        }

        stats.add_newton_iterations(result.iterations);
        if result.converged {
            tracing::info!(iterations = result.iterations, residual = result.final_residual, "Newton converged");
        } else {
            tracing::warn!(
                iterations = result.iterations,
                residual = result.final_residual,
                tol = self.conv.tol,
                "Newton failed to converge"
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverOptions;
    use crate::core::LocalInnerProduct;
    use crate::domain::GridDiscretization;
    use crate::parallel::ThreadComm;
    use crate::solver::CgSolver;
    use approx::assert_abs_diff_eq;

    /// F(u) = u² − c componentwise.
    struct Square(f64);
    impl NonlinearOperator<Field> for Square {
        fn apply(&mut self, u: &Field, out: &mut Field) -> Result<(), JfnkError> {
            for (o, x) in out.as_mut_slice().iter_mut().zip(u.as_slice()) {
                *o = x * x - self.0;
            }
            Ok(())
        }
    }

    #[test]
    fn shifted_operator_linearizes_at_base() {
        // J of u² at u = 3 is 6, so J δ = 12 gives δ = 2
        let base = Field::filled(1, 2, 3.0);
        let mut point = Field::zeros(1, 2);
        let mut sq = Square(0.0);
        let mut shifted = ShiftedOperator::new(&mut sq, &base, &mut point);
        let b = Field::filled(1, 2, 12.0);
        let mut x = Field::zeros(1, 2);
        let stats = CgSolver::new(1, 2, 1e-8, 10)
            .with_eps(1e-7)
            .solve(&mut shifted, &LocalInnerProduct, &b, &mut x)
            .unwrap();
        assert!(stats.converged);
        assert_abs_diff_eq!(x[(0, 0)], 2.0, epsilon = 1e-5);
    }

    fn context(n: usize, nt: usize) -> ProcessContext<ThreadComm> {
        let disc = GridDiscretization::new(n, n, nt, 0.01).unwrap();
        ProcessContext::new(ThreadComm::solo(), disc, SolverOptions::default()).unwrap()
    }

    #[test]
    fn zero_state_is_already_a_solution() {
        let mut ctx = context(6, 10);
        let mut newton = NewtonSolver::new(&ctx);
        let stats = newton.step(&mut ctx).unwrap();
        assert!(stats.converged);
        assert_eq!(stats.iterations, 0);
        assert_eq!(ctx.stats.newton_iterations, 0);
        assert_eq!(ctx.stats.cg_iterations, 0);
    }

    #[test]
    fn step_reduces_residual_below_tolerance() {
        let mut ctx = context(8, 20);
        ctx.init_with(|gy, gx| if (2..5).contains(&gy) && (2..5).contains(&gx) { 0.1 } else { 0.0 });
        ctx.begin_time_step();
        let mut newton = NewtonSolver::new(&ctx);
        let stats = newton.step(&mut ctx).unwrap();
        assert!(stats.converged, "residual {}", stats.final_residual);
        assert!(stats.iterations >= 1);
        assert!(stats.final_residual < ctx.options.newton_tol);

        let mut s = ctx.zeros();
        let x = ctx.x_new.clone();
        ctx.evaluate(&x, &mut s).unwrap();
        assert!(ctx.norm(&s).unwrap() < ctx.options.newton_tol);
        assert_eq!(ctx.stats.newton_iterations, stats.iterations as u64);
        assert!(ctx.stats.cg_iterations > 0);
    }
}
