//! Per-rank solver context.
//!
//! `ProcessContext` owns everything one rank needs for the whole run: its
//! communicator, the shared discretization, its subdomain geometry, halo
//! buffers, the persistent fields `x_new`/`x_old`, the CG solver with its
//! scratch vectors, and the run statistics. It is built once at startup and
//! passed by reference to every solve; nothing lives in globals.

use faer::Mat;

use crate::config::SolverOptions;
use crate::core::{DistributedInnerProduct, Field};
use crate::domain::{GridDiscretization, HaloBuffers, ProcessSubdomain};
use crate::error::JfnkError;
use crate::operator::{assemble_dense, DiffusionOperator};
use crate::parallel::Comm;
use crate::solver::CgSolver;
use crate::utils::convergence::{Convergence, SolveStats};
use crate::utils::RunStatistics;

pub struct ProcessContext<C: Comm> {
    pub comm: C,
    pub discretization: GridDiscretization,
    pub subdomain: ProcessSubdomain,
    pub options: SolverOptions,
    pub halo: HaloBuffers,
    /// Current iterate.
    pub x_new: Field,
    /// Solution at the previous time level.
    pub x_old: Field,
    pub cg: CgSolver,
    pub stats: RunStatistics,
}

impl<C: Comm> ProcessContext<C> {
    /// Decompose `discretization` over the ranks of `comm` and allocate this
    /// rank's state. Collective: every rank must call it.
    pub fn new(mut comm: C, discretization: GridDiscretization, options: SolverOptions) -> Result<Self, JfnkError> {
        let subdomain = ProcessSubdomain::build(&mut comm, &discretization)?;
        let (nx, ny) = (subdomain.nx, subdomain.ny);
        let cg = CgSolver::new(nx, ny, options.cg_tol, options.cg_max_iters).with_eps(options.fd_eps);
        Ok(Self {
            halo: HaloBuffers::new(&subdomain),
            x_new: Field::zeros(nx, ny),
            x_old: Field::zeros(nx, ny),
            cg,
            stats: RunStatistics::default(),
            comm,
            discretization,
            subdomain,
            options,
        })
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    /// A zero field shaped like this rank's subdomain.
    pub fn zeros(&self) -> Field {
        Field::zeros(self.subdomain.nx, self.subdomain.ny)
    }

    /// Fill `x_new` from a function of global grid coordinates `(gy, gx)`.
    pub fn init_with(&mut self, mut f: impl FnMut(usize, usize) -> f64) {
        let (sy, sx) = (self.subdomain.starty, self.subdomain.startx);
        self.x_new = Field::from_fn(self.subdomain.nx, self.subdomain.ny, |j, i| f(sy + j, sx + i));
    }

    /// The residual operator of this rank, relative to the current `x_old`.
    pub fn operator(&mut self) -> DiffusionOperator<'_, C> {
        DiffusionOperator::new(
            &self.comm,
            &self.subdomain,
            &self.discretization,
            &self.x_old,
            &mut self.halo,
            &mut self.stats,
        )
    }

    /// s ← F(u). Collective.
    pub fn evaluate(&mut self, u: &Field, s: &mut Field) -> Result<(), JfnkError> {
        self.operator().evaluate(u, s)
    }

    /// Start a new time level: `x_old ← x_new`.
    pub fn begin_time_step(&mut self) {
        self.x_old.copy_from(&self.x_new);
    }

    /// Matrix-free CG on the Jacobian of F at the initial `x`. Collective.
    ///
    /// Returns the solver statistics; non-convergence is `Ok` with
    /// `converged == false`. CG iterations are added to the run statistics.
    pub fn linear_solve(&mut self, x: &mut Field, b: &Field, max_iters: usize, tol: f64) -> Result<SolveStats<f64>, JfnkError> {
        self.cg.conv = Convergence::new(tol, max_iters);
        let ip = DistributedInnerProduct::new(&self.comm);
        let mut op = DiffusionOperator::new(
            &self.comm,
            &self.subdomain,
            &self.discretization,
            &self.x_old,
            &mut self.halo,
            &mut self.stats,
        );
        let stats = self.cg.solve(&mut op, &ip, b, x)?;
        self.stats.add_cg_iterations(stats.iterations);
        Ok(stats)
    }

    /// `linear_solve` reduced to its convergence flag.
    pub fn cg_solve(&mut self, x: &mut Field, b: &Field, max_iters: usize, tol: f64) -> Result<bool, JfnkError> {
        Ok(self.linear_solve(x, b, max_iters, tol)?.converged)
    }

    /// Global ‖f‖₂. Collective.
    pub fn norm(&self, f: &Field) -> Result<f64, JfnkError> {
        use crate::core::InnerProduct;
        DistributedInnerProduct::new(&self.comm).norm(f)
    }

    /// Finite-difference Jacobian of F at `x_new` as a dense matrix.
    /// Single-rank only.
    pub fn assemble_jacobian(&mut self) -> Result<Mat<f64>, JfnkError> {
        if self.comm.size() != 1 {
            return Err(JfnkError::Unsupported("dense Jacobian assembly needs a single process"));
        }
        let eps = self.options.fd_eps;
        let at = self.x_new.clone();
        assemble_dense(&mut self.operator(), &at, eps)
    }

    /// Log each rank's subdomain, one rank at a time in rank order.
    /// Collective.
    pub fn report_topology(&self) -> Result<(), JfnkError> {
        for r in 0..self.comm.size() {
            if r == self.comm.rank() {
                for line in self.subdomain.to_string().lines() {
                    tracing::info!(rank = r, "{line}");
                }
            }
            self.comm.barrier()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ThreadComm;

    fn ctx(n: usize) -> ProcessContext<ThreadComm> {
        let disc = GridDiscretization::new(n, n, 10, 0.01).unwrap();
        ProcessContext::new(ThreadComm::solo(), disc, SolverOptions::default()).unwrap()
    }

    #[test]
    fn new_allocates_local_fields() {
        let c = ctx(6);
        assert_eq!((c.x_new.nx(), c.x_new.ny()), (6, 6));
        assert_eq!(c.stats, RunStatistics::default());
    }

    #[test]
    fn init_uses_global_coordinates() {
        let mut c = ctx(4);
        c.init_with(|gy, gx| (gy * 10 + gx) as f64);
        assert_eq!(c.x_new[(3, 2)], 32.0);
        c.begin_time_step();
        assert_eq!(c.x_old, c.x_new);
    }

    #[test]
    fn zero_rhs_converges_immediately() {
        let mut c = ctx(5);
        let b = c.zeros();
        let mut x = c.zeros();
        // F(0) = alpha x_old = 0 with x_old = 0
        assert!(c.cg_solve(&mut x, &b, 50, 1e-8).unwrap());
        assert_eq!(c.stats.cg_iterations, 0);
        // two operator evaluations for the initial residual
        assert_eq!(c.stats.flops, 2 * crate::operator::flops_per_evaluation(5, 5));
    }

    #[test]
    fn jacobian_only_on_one_rank() {
        let mut c = ctx(3);
        let j = c.assemble_jacobian().unwrap();
        assert_eq!((j.nrows(), j.ncols()), (9, 9));
        let mut comms = ThreadComm::world(2).unwrap();
        let c1 = comms.pop().unwrap();
        drop(comms);
        let disc = GridDiscretization::new(4, 4, 1, 1.0).unwrap();
        // building the context needs no messages, only the Cartesian layout
        let mut multi = ProcessContext::new(c1, disc, SolverOptions::default()).unwrap();
        assert!(matches!(multi.assemble_jacobian(), Err(JfnkError::Unsupported(_))));
    }
}
