//! Edge buffers for the halo exchange.
//!
//! Send buffers hold this rank's outermost row/column before it is posted;
//! receive buffers hold the neighbor's facing row/column after the wait.
//! Both are allocated once, sized to the local edge, and reused by every
//! operator evaluation.

use crate::core::Field;
use crate::domain::{Direction, ProcessSubdomain};
use crate::parallel::HaloTransfer;

#[derive(Clone, Debug)]
pub struct HaloBuffers {
    send: [Vec<f64>; 4],
    recv: [Vec<f64>; 4],
    present: [bool; 4],
}

impl HaloBuffers {
    pub fn new(subdomain: &ProcessSubdomain) -> Self {
        let sized = |dir: Direction| vec![0.0; subdomain.edge_len(dir)];
        Self {
            send: Direction::ALL.map(sized),
            recv: Direction::ALL.map(sized),
            present: Direction::ALL.map(|dir| !subdomain.neighbor(dir).is_boundary()),
        }
    }

    /// Copy the edge of `u` facing `dir` into its send buffer.
    pub fn pack(&mut self, dir: Direction, u: &Field) {
        let buf = &mut self.send[dir.index()];
        let (nx, ny) = (u.nx(), u.ny());
        match dir {
            Direction::North => buf.copy_from_slice(u.row(ny - 1)),
            Direction::South => buf.copy_from_slice(u.row(0)),
            Direction::East => {
                for (j, b) in buf.iter_mut().enumerate() {
                    *b = u[(j, nx - 1)];
                }
            }
            Direction::West => {
                for (j, b) in buf.iter_mut().enumerate() {
                    *b = u[(j, 0)];
                }
            }
        }
    }

    pub fn outgoing(&self, dir: Direction) -> &[f64] {
        &self.send[dir.index()]
    }

    /// Data received from the neighbor across `dir`, or `None` on a global
    /// boundary side.
    pub fn incoming(&self, dir: Direction) -> Option<&[f64]> {
        self.present[dir.index()].then(|| self.recv[dir.index()].as_slice())
    }

    pub fn incoming_mut(&mut self, dir: Direction) -> &mut [f64] {
        &mut self.recv[dir.index()]
    }

    /// Pack every side that has a neighbor and pair its buffers with the
    /// neighbor's rank.
    pub fn transfers<'a>(&'a mut self, subdomain: &ProcessSubdomain, u: &Field) -> Vec<HaloTransfer<'a>> {
        for dir in Direction::ALL {
            if self.present[dir.index()] {
                self.pack(dir, u);
            }
        }
        Direction::ALL
            .into_iter()
            .zip(self.send.iter().zip(self.recv.iter_mut()))
            .filter_map(|(dir, (send, recv))| {
                subdomain.neighbor(dir).rank().map(|peer| HaloTransfer {
                    peer,
                    send: send.as_slice(),
                    recv: recv.as_mut_slice(),
                })
            })
            .collect()
    }
}
