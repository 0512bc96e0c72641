//! Convergence bookkeeping and run statistics.

pub mod convergence;
pub mod stats;

pub use convergence::{Convergence, SolveStats};
pub use stats::RunStatistics;
