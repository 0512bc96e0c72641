//! Convergence tracking & tolerance checks for iterative solvers.

/// Stopping criteria: absolute residual norm below `tol`, at most
/// `max_iters` iterations.
#[derive(Clone, Debug)]
pub struct Convergence<T> {
    pub tol: T,
    pub max_iters: usize,
}

#[derive(Clone, Debug)]
pub struct SolveStats<T> {
    pub iterations: usize,
    pub final_residual: T,
    pub converged: bool,
}

impl<T: Copy + num_traits::Float> Convergence<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { tol, max_iters }
    }

    pub fn is_converged(&self, res_norm: T) -> bool {
        res_norm < self.tol
    }

    /// Returns (should_stop, stats) given current `res_norm` after `i` iterations.
    pub fn check(&self, res_norm: T, i: usize) -> (bool, SolveStats<T>) {
        let converged = self.is_converged(res_norm);
        (
            converged || i >= self.max_iters,
            SolveStats {
                iterations: i,
                final_residual: res_norm,
                converged,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_absolute_tolerance() {
        let conv = Convergence::new(1e-6, 10);
        assert!(conv.is_converged(9.9e-7));
        assert!(!conv.is_converged(1e-6));
        let (stop, stats) = conv.check(1.0, 10);
        assert!(stop);
        assert!(!stats.converged);
        let (stop, _) = conv.check(1.0, 3);
        assert!(!stop);
    }
}
