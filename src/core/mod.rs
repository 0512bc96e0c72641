//! Field storage and the traits shared by the operator and the solvers.

pub mod field;
pub mod traits;
pub mod wrappers;

pub use field::Field;
pub use traits::{InnerProduct, NonlinearOperator};
pub use wrappers::{DistributedInnerProduct, LocalInnerProduct};
