//! MPI-based parallel communication module.
//!
//! This module provides an implementation of the `Comm` trait using the MPI (Message Passing Interface)
//! backend for distributed-memory parallelism. Point-to-point halo traffic goes through the Cartesian
//! communicator created by `create_cartesian`; reductions use the same communicator once it exists.
//! The implementation is only available when the `mpi` feature is enabled.
//!
//! # Usage
//!
//! The caller owns MPI initialisation and must keep the `Universe` alive for as long as any
//! `MpiComm` is in use:
//!
//! ```no_run
//! # #[cfg(feature = "mpi")]
//! # {
//! let universe = mpi::initialize().unwrap();
//! let comm = jfnk_diffusion::parallel::MpiComm::new(universe.world());
//! # }
//! ```
//!
//! # References
//! - [MPI Standard](https://www.mpi-forum.org/)

use mpi::collective::SystemOperation;
use mpi::topology::{CartesianCommunicator, SimpleCommunicator};
use mpi::traits::*;

use super::{Comm, HaloTransfer};
use crate::error::JfnkError;

/// MPI communicator wrapper for distributed parallelism.
pub struct MpiComm {
    /// The communicator the process group was started with.
    pub world: SimpleCommunicator,
    /// Cartesian communicator, once created.
    pub cart: Option<CartesianCommunicator>,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
}

impl MpiComm {
    pub fn new(world: SimpleCommunicator) -> Self {
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm {
            world,
            cart: None,
            rank,
            size,
        }
    }

    fn cartesian(&self) -> Result<&CartesianCommunicator, JfnkError> {
        self.cart.as_ref().ok_or_else(|| {
            JfnkError::InvalidTopology("Cartesian communicator has not been created".to_string())
        })
    }
}

impl Comm for MpiComm {
    /// Returns the rank (ID) of this process.
    fn rank(&self) -> usize {
        self.rank
    }
    /// Returns the total number of processes in the communicator.
    fn size(&self) -> usize {
        self.size
    }
    /// Synchronizes all processes at a barrier.
    fn barrier(&self) -> Result<(), JfnkError> {
        match &self.cart {
            Some(cart) => cart.barrier(),
            None => self.world.barrier(),
        }
        Ok(())
    }

    /// Element-wise all-reduce sum; MPI hands every member the same result.
    fn all_reduce_sum_into(&self, buf: &mut [f64]) -> Result<(), JfnkError> {
        let send = buf.to_vec();
        match &self.cart {
            Some(cart) => cart.all_reduce_into(&send[..], buf, &SystemOperation::sum()),
            None => self.world.all_reduce_into(&send[..], buf, &SystemOperation::sum()),
        }
        Ok(())
    }

    fn create_cartesian(&mut self, dims: [usize; 2], periodic: [bool; 2]) -> Result<(), JfnkError> {
        let dims_i = [dims[0] as i32, dims[1] as i32];
        let cart = self
            .world
            .create_cartesian_communicator(&dims_i, &periodic, false)
            .ok_or_else(|| {
                JfnkError::InvalidTopology(format!(
                    "MPI refused a {dims:?} Cartesian grid for {} processes",
                    self.size
                ))
            })?;
        self.cart = Some(cart);
        Ok(())
    }

    fn cart_coords(&self, rank: usize) -> Result<[usize; 2], JfnkError> {
        let coords = self.cartesian()?.rank_to_coordinates(rank as i32);
        match coords[..] {
            [row, col] => Ok([row as usize, col as usize]),
            _ => Err(JfnkError::InvalidTopology(format!(
                "expected 2 coordinates, MPI returned {}",
                coords.len()
            ))),
        }
    }

    fn cart_rank(&self, coords: [usize; 2]) -> Result<usize, JfnkError> {
        let coords_i = [coords[0] as i32, coords[1] as i32];
        Ok(self.cartesian()?.coordinates_to_rank(&coords_i) as usize)
    }

    fn cart_shift(&self, axis: usize, disp: i64) -> Result<(Option<usize>, Option<usize>), JfnkError> {
        let (src, dest) = self.cartesian()?.shift(axis as i32, disp as i32);
        Ok((src.map(|r| r as usize), dest.map(|r| r as usize)))
    }

    /// Posts `Irecv`/`Isend` pairs, runs `overlap`, then waits on every request.
    fn halo_exchange<F: FnOnce()>(
        &self,
        transfers: &mut [HaloTransfer<'_>],
        overlap: F,
    ) -> Result<(), JfnkError> {
        let cart = self.cartesian()?;
        let my_rank = cart.rank();
        mpi::request::scope(|scope| {
            let mut requests = Vec::with_capacity(2 * transfers.len());
            for t in transfers.iter_mut() {
                let peer = cart.process_at_rank(t.peer as i32);
                requests.push(peer.immediate_receive_into_with_tag(scope, &mut *t.recv, t.peer as i32));
                requests.push(peer.immediate_send_with_tag(scope, t.send, my_rank));
            }
            overlap();
            for request in requests {
                request.wait();
            }
        });
        Ok(())
    }
}
