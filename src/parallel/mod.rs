//! Messaging layer: the `Comm` trait and its backends.
//!
//! Every rank runs the same program in lock-step. Each collective
//! (`all_reduce_sum_into`, `barrier`) and each `halo_exchange` is a
//! rendezvous: a rank that skips one deadlocks the whole group. Callers must
//! guarantee that all ranks issue the same sequence of collectives.

use crate::error::JfnkError;

pub mod thread_comm;
pub use thread_comm::ThreadComm;

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

/// One side of a halo exchange with a single peer.
///
/// `send` is delivered to `peer` tagged with the local rank; `recv` is filled
/// from the message `peer` sent tagged with its own rank.
pub struct HaloTransfer<'a> {
    pub peer: usize,
    pub send: &'a [f64],
    pub recv: &'a mut [f64],
}

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self) -> Result<(), JfnkError>;

    /// Element-wise sum of `buf` across all ranks, in place. Every rank
    /// receives the identical result.
    fn all_reduce_sum_into(&self, buf: &mut [f64]) -> Result<(), JfnkError>;

    fn all_reduce_sum(&self, x: f64) -> Result<f64, JfnkError> {
        let mut buf = [x];
        self.all_reduce_sum_into(&mut buf)?;
        Ok(buf[0])
    }

    /// Create the 2D Cartesian process grid used by the `cart_*` queries and
    /// by `halo_exchange`. `dims` is `[rows, cols]`; axis 0 runs south to north.
    fn create_cartesian(&mut self, dims: [usize; 2], periodic: [bool; 2]) -> Result<(), JfnkError>;

    /// Grid coordinates `[row, col]` of `rank`.
    fn cart_coords(&self, rank: usize) -> Result<[usize; 2], JfnkError>;

    /// Rank at grid coordinates `[row, col]`.
    fn cart_rank(&self, coords: [usize; 2]) -> Result<usize, JfnkError>;

    /// Shift along `axis` by `disp`: `(source, destination)`, `None` past an
    /// open (non-periodic) edge.
    fn cart_shift(&self, axis: usize, disp: i64) -> Result<(Option<usize>, Option<usize>), JfnkError>;

    /// Post a non-blocking receive and send for every transfer, run `overlap`
    /// while they are in flight, then wait for all of them. Receive buffers
    /// must not be read before this returns.
    fn halo_exchange<F: FnOnce()>(
        &self,
        transfers: &mut [HaloTransfer<'_>],
        overlap: F,
    ) -> Result<(), JfnkError>;
}

/// Row-major Cartesian layout, the ordering MPI uses without reordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CartesianGrid {
    pub dims: [usize; 2],
    pub periodic: [bool; 2],
}

impl CartesianGrid {
    pub fn new(dims: [usize; 2], periodic: [bool; 2], size: usize) -> Result<Self, JfnkError> {
        if dims[0] == 0 || dims[1] == 0 {
            return Err(JfnkError::InvalidTopology(format!(
                "Cartesian dimensions must be positive, got {dims:?}"
            )));
        }
        if dims[0] * dims[1] != size {
            return Err(JfnkError::InvalidTopology(format!(
                "Cartesian dimensions {dims:?} do not match {size} processes"
            )));
        }
        Ok(Self { dims, periodic })
    }

    pub fn size(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    pub fn coords(&self, rank: usize) -> Result<[usize; 2], JfnkError> {
        if rank >= self.size() {
            return Err(JfnkError::InvalidTopology(format!(
                "rank {rank} outside a grid of {} processes",
                self.size()
            )));
        }
        Ok([rank / self.dims[1], rank % self.dims[1]])
    }

    pub fn rank(&self, coords: [usize; 2]) -> Result<usize, JfnkError> {
        if coords[0] >= self.dims[0] || coords[1] >= self.dims[1] {
            return Err(JfnkError::InvalidTopology(format!(
                "coordinates {coords:?} outside grid {:?}",
                self.dims
            )));
        }
        Ok(coords[0] * self.dims[1] + coords[1])
    }

    pub fn shift(
        &self,
        rank: usize,
        axis: usize,
        disp: i64,
    ) -> Result<(Option<usize>, Option<usize>), JfnkError> {
        if axis > 1 {
            return Err(JfnkError::InvalidTopology(format!(
                "axis {axis} out of range for a 2D grid"
            )));
        }
        let coords = self.coords(rank)?;
        let step = |d: i64| -> Result<Option<usize>, JfnkError> {
            let extent = self.dims[axis] as i64;
            let mut c = coords[axis] as i64 + d;
            if self.periodic[axis] {
                c = c.rem_euclid(extent);
            } else if c < 0 || c >= extent {
                return Ok(None);
            }
            let mut moved = coords;
            moved[axis] = c as usize;
            self.rank(moved).map(Some)
        };
        Ok((step(-disp)?, step(disp)?))
    }
}

/// Size the global rayon pool used by the interior stencil sweep.
/// `None` uses one thread per logical CPU. Has no effect once the pool exists.
#[cfg(feature = "rayon")]
pub fn init_thread_pool(threads: Option<usize>) {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or_else(num_cpus::get))
        .build_global()
        .ok();
}
