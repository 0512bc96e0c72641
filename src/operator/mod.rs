//! The discretized nonlinear diffusion operator and its Jacobian.

pub mod diffusion;
pub mod jacobian;

pub use diffusion::{flops_per_evaluation, DiffusionOperator};
pub use jacobian::assemble_dense;
