//! Nonlinear and linear solvers.
//!
//! [`NewtonSolver`] drives one implicit time step; each of its corrections is
//! a matrix-free [`CgSolver`] solve on the Jacobian of the residual operator.

pub mod cg;
pub use cg::CgSolver;

pub mod newton;
pub use newton::{NewtonSolver, ShiftedOperator};
