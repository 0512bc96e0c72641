//! Inner products over distributed fields.
//!
//! A field only holds this rank's points, so a global dot product is the
//! local sum reduced across every rank. `DistributedInnerProduct` does that
//! through a [`Comm`]; `LocalInnerProduct` skips the reduction and is meant
//! for single-rank use.
//!
//! Local sums are accumulated sequentially in storage order, so a given
//! field always produces the same bits; the reduction then hands every rank
//! the same global value, which keeps all ranks on the same control path.

use crate::core::field::Field;
use crate::core::traits::InnerProduct;
use crate::error::JfnkError;
use crate::parallel::Comm;

/// Collective dot product and norm across all ranks of `comm`.
pub struct DistributedInnerProduct<'a, C: Comm> {
    /// Reference to the communicator implementing the `Comm` trait.
    pub comm: &'a C,
}

impl<'a, C: Comm> DistributedInnerProduct<'a, C> {
    pub fn new(comm: &'a C) -> Self {
        Self { comm }
    }
}

impl<C: Comm> InnerProduct<Field> for DistributedInnerProduct<'_, C> {
    type Scalar = f64;

    /// Computes the global dot product `x^T y`.
    fn dot(&self, x: &Field, y: &Field) -> Result<f64, JfnkError> {
        x.ensure_same_shape(y)?;
        self.comm.all_reduce_sum(x.local_dot(y))
    }

    /// Computes the global Euclidean norm `||x||_2`.
    fn norm(&self, x: &Field) -> Result<f64, JfnkError> {
        Ok(self.comm.all_reduce_sum(x.local_sum_sq())?.sqrt())
    }
}

/// Inner product without any reduction.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalInnerProduct;

impl InnerProduct<Field> for LocalInnerProduct {
    type Scalar = f64;

    fn dot(&self, x: &Field, y: &Field) -> Result<f64, JfnkError> {
        x.ensure_same_shape(y)?;
        Ok(x.local_dot(y))
    }

    fn norm(&self, x: &Field) -> Result<f64, JfnkError> {
        Ok(x.local_sum_sq().sqrt())
    }
}
