//! Grid discretization, process topology and halo storage.

pub mod discretization;
pub mod halo;
pub mod subdomain;

pub use discretization::GridDiscretization;
pub use halo::HaloBuffers;
pub use subdomain::{create_dim, Boundary, Direction, Neighbor, ProcessSubdomain};
