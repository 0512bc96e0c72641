pub mod options;
pub use options::{FD_EPS, SolverOptions};
