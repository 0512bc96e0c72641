//! Core traits for the matrix-free solvers.

use crate::error::JfnkError;

/// Nonlinear residual map: out ← F(u).
///
/// The Jacobian of `F` is never formed; Krylov solvers only see it through
/// finite differences of `apply`. Implementations that communicate must be
/// called in lock-step on every rank.
pub trait NonlinearOperator<V> {
    /// Compute out = F(u). `u` and `out` never alias.
    fn apply(&mut self, u: &V, out: &mut V) -> Result<(), JfnkError>;
}

/// Inner products & norms.
pub trait InnerProduct<V> {
    /// Associated scalar type.
    type Scalar: Copy + PartialOrd + From<f64>;
    /// Compute dot(x, y).
    fn dot(&self, x: &V, y: &V) -> Result<Self::Scalar, JfnkError>;
    /// Compute ‖x‖₂.
    fn norm(&self, x: &V) -> Result<Self::Scalar, JfnkError>;
}

