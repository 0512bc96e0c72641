//! Per-process work counters.

/// Counters owned by one rank. They only grow; aggregating them across
/// ranks is left to the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Floating-point operations spent in operator evaluations.
    pub flops: u64,
    pub cg_iterations: u64,
    pub newton_iterations: u64,
}

impl RunStatistics {
    pub fn add_flops(&mut self, n: u64) {
        self.flops += n;
    }

    pub fn add_cg_iterations(&mut self, n: usize) {
        self.cg_iterations += n as u64;
    }

    pub fn add_newton_iterations(&mut self, n: usize) {
        self.newton_iterations += n as u64;
    }
}
