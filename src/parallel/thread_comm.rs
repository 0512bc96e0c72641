// In-process message passing: one `ThreadComm` per simulated rank.
//
// Ranks are connected by mpsc channels. Sends never block, so posting a send
// is the non-blocking half of an exchange; receives are matched by
// (source, tag) with out-of-order messages parked until asked for. Messages
// between one pair of ranks are delivered in order, as MPI guarantees.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

use super::{CartesianGrid, Comm, HaloTransfer};
use crate::error::JfnkError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tag {
    /// Point-to-point, tagged with the sender's rank.
    Point(usize),
    Reduce,
}

struct Envelope {
    src: usize,
    tag: Tag,
    data: Vec<f64>,
}

pub struct ThreadComm {
    rank: usize,
    size: usize,
    peers: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    parked: RefCell<VecDeque<Envelope>>,
    cart: Option<CartesianGrid>,
}

impl ThreadComm {
    /// Create `size` connected ranks. Move each one onto its own thread.
    pub fn world(size: usize) -> Result<Vec<ThreadComm>, JfnkError> {
        if size == 0 {
            return Err(JfnkError::InvalidTopology(
                "a communicator needs at least one process".to_string(),
            ));
        }
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| mpsc::channel()).unzip();
        Ok(receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ThreadComm {
                rank,
                size,
                peers: senders.clone(),
                inbox,
                parked: RefCell::new(VecDeque::new()),
                cart: None,
            })
            .collect())
    }

    /// A single-rank communicator.
    pub fn solo() -> Self {
        let (tx, inbox) = mpsc::channel();
        ThreadComm {
            rank: 0,
            size: 1,
            peers: vec![tx],
            inbox,
            parked: RefCell::new(VecDeque::new()),
            cart: None,
        }
    }

    fn post(&self, dest: usize, tag: Tag, data: Vec<f64>) -> Result<(), JfnkError> {
        let peer = self.peers.get(dest).ok_or_else(|| {
            JfnkError::Comm(format!("rank {dest} outside a world of {}", self.size))
        })?;
        peer.send(Envelope {
            src: self.rank,
            tag,
            data,
        })
        .map_err(|_| JfnkError::Comm(format!("rank {dest} has shut down")))
    }

    fn take(&self, src: usize, tag: Tag) -> Result<Vec<f64>, JfnkError> {
        {
            let mut parked = self.parked.borrow_mut();
            if let Some(pos) = parked.iter().position(|e| e.src == src && e.tag == tag) {
                if let Some(env) = parked.remove(pos) {
                    return Ok(env.data);
                }
            }
        }
        loop {
            let env = self.inbox.recv().map_err(|_| {
                JfnkError::Comm(format!("rank {} lost every peer while waiting", self.rank))
            })?;
            if env.src == src && env.tag == tag {
                return Ok(env.data);
            }
            self.parked.borrow_mut().push_back(env);
        }
    }

    fn grid(&self) -> Result<&CartesianGrid, JfnkError> {
        self.cart.as_ref().ok_or_else(|| {
            JfnkError::InvalidTopology("Cartesian grid has not been created".to_string())
        })
    }
}

impl Comm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<(), JfnkError> {
        self.all_reduce_sum_into(&mut [])
    }

    fn all_reduce_sum_into(&self, buf: &mut [f64]) -> Result<(), JfnkError> {
        for dest in 0..self.size {
            self.post(dest, Tag::Reduce, buf.to_vec())?;
        }
        let mut total = vec![0.0; buf.len()];
        // Summing in rank order makes the result bitwise identical everywhere.
        for src in 0..self.size {
            let part = self.take(src, Tag::Reduce)?;
            if part.len() != total.len() {
                return Err(JfnkError::Comm(format!(
                    "reduction length mismatch: rank {src} sent {}, expected {}",
                    part.len(),
                    total.len()
                )));
            }
            for (t, p) in total.iter_mut().zip(part) {
                *t += p;
            }
        }
        buf.copy_from_slice(&total);
        Ok(())
    }

    fn create_cartesian(&mut self, dims: [usize; 2], periodic: [bool; 2]) -> Result<(), JfnkError> {
        self.cart = Some(CartesianGrid::new(dims, periodic, self.size)?);
        Ok(())
    }

    fn cart_coords(&self, rank: usize) -> Result<[usize; 2], JfnkError> {
        self.grid()?.coords(rank)
    }

    fn cart_rank(&self, coords: [usize; 2]) -> Result<usize, JfnkError> {
        self.grid()?.rank(coords)
    }

    fn cart_shift(&self, axis: usize, disp: i64) -> Result<(Option<usize>, Option<usize>), JfnkError> {
        self.grid()?.shift(self.rank, axis, disp)
    }

    fn halo_exchange<F: FnOnce()>(
        &self,
        transfers: &mut [HaloTransfer<'_>],
        overlap: F,
    ) -> Result<(), JfnkError> {
        for t in transfers.iter() {
            self.post(t.peer, Tag::Point(self.rank), t.send.to_vec())?;
        }
        overlap();
        for t in transfers.iter_mut() {
            let data = self.take(t.peer, Tag::Point(t.peer))?;
            if data.len() != t.recv.len() {
                return Err(JfnkError::Comm(format!(
                    "halo from rank {} has {} values, expected {}",
                    t.peer,
                    data.len(),
                    t.recv.len()
                )));
            }
            t.recv.copy_from_slice(&data);
        }
        Ok(())
    }
}
