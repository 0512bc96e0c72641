//! jfnk-diffusion: matrix-free Newton–Krylov for a 2D reaction–diffusion
//! problem on a Cartesian process grid.
//!
//! The unit square is split into one rectangle per process. Each rank owns a
//! [`ProcessContext`]; the nonlinear residual exchanges edge values with its
//! four neighbors while sweeping the interior, and the CG solver reaches the
//! Jacobian only through finite differences of that residual.

pub mod parallel;

pub mod config;
pub mod context;
pub mod core;
pub mod domain;
pub mod error;
pub mod operator;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use context::*;
pub use crate::core::*;
pub use domain::*;
pub use error::*;
pub use operator::*;
pub use parallel::{Comm, ThreadComm};
pub use solver::*;
pub use utils::*;
