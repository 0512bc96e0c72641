//! Process topology and per-rank subdomain geometry.
//!
//! The process count is factored into a near-square `ndomy × ndomx` grid
//! (see [`create_dim`]), the communicator builds a non-periodic Cartesian
//! layout of that shape, and each rank derives its own rectangle of the
//! global grid plus the ranks of its four neighbors. Axis 0 of the process
//! grid runs south to north, axis 1 west to east.

use std::fmt;

use bitflags::bitflags;

use crate::domain::GridDiscretization;
use crate::error::JfnkError;
use crate::parallel::Comm;

/// One of the four stencil directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    fn flag(self) -> Boundary {
        match self {
            Direction::North => Boundary::NORTH,
            Direction::East => Boundary::EAST,
            Direction::South => Boundary::SOUTH,
            Direction::West => Boundary::WEST,
        }
    }
}

/// What lies across one side of a subdomain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Neighbor {
    Rank(usize),
    /// Global edge of the grid: no process, no data.
    Boundary,
}

impl Neighbor {
    pub fn rank(self) -> Option<usize> {
        match self {
            Neighbor::Rank(r) => Some(r),
            Neighbor::Boundary => None,
        }
    }

    pub fn is_boundary(self) -> bool {
        matches!(self, Neighbor::Boundary)
    }
}

impl From<Option<usize>> for Neighbor {
    fn from(rank: Option<usize>) -> Self {
        rank.map_or(Neighbor::Boundary, Neighbor::Rank)
    }
}

impl fmt::Display for Neighbor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Neighbor::Rank(r) => write!(f, "{r}"),
            Neighbor::Boundary => write!(f, "-"),
        }
    }
}

bitflags! {
    /// Sides of a subdomain that touch the global boundary.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Boundary: u8 {
        const NORTH = 0b0001;
        const EAST  = 0b0010;
        const SOUTH = 0b0100;
        const WEST  = 0b1000;
    }
}

/// Factor `size` into `(rows, cols)` as close to square as the divisors
/// allow, with `rows >= cols`. Primes (and 1) give `(size, 1)`.
pub fn create_dim(size: usize) -> Result<(usize, usize), JfnkError> {
    if size == 0 {
        return Err(JfnkError::InvalidTopology(
            "process count must be at least 1".to_string(),
        ));
    }
    let dividers: Vec<usize> = (2..size).rev().filter(|i| size % i == 0).collect();
    if dividers.is_empty() {
        return Ok((size, 1));
    }
    let divider = dividers[dividers.len() / 2];
    Ok((size / divider, divider))
}

/// Geometry of the part of the global grid owned by one rank.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessSubdomain {
    /// Process grid rows.
    pub ndomy: usize,
    /// Process grid columns.
    pub ndomx: usize,
    /// Row of this rank in the process grid.
    pub domy: usize,
    /// Column of this rank in the process grid.
    pub domx: usize,
    pub neighbor_north: Neighbor,
    pub neighbor_south: Neighbor,
    pub neighbor_east: Neighbor,
    pub neighbor_west: Neighbor,
    pub boundary: Boundary,
    /// Local horizontal points.
    pub nx: usize,
    /// Local vertical points.
    pub ny: usize,
    pub startx: usize,
    pub starty: usize,
    /// Inclusive.
    pub endx: usize,
    /// Inclusive.
    pub endy: usize,
    pub n_total: usize,
    pub rank: usize,
    pub size: usize,
}

impl ProcessSubdomain {
    /// Create the Cartesian process grid on `comm` and describe this rank's
    /// share of `discretization`.
    pub fn build<C: Comm>(comm: &mut C, discretization: &GridDiscretization) -> Result<Self, JfnkError> {
        let rank = comm.rank();
        let size = comm.size();
        let (ndomy, ndomx) = create_dim(size)?;
        if discretization.nx < ndomx || discretization.ny < ndomy {
            return Err(JfnkError::InvalidTopology(format!(
                "{} x {} grid cannot be split over a {ndomy} x {ndomx} process grid",
                discretization.nx, discretization.ny
            )));
        }

        comm.create_cartesian([ndomy, ndomx], [false, false])?;
        let [domy, domx] = comm.cart_coords(rank)?;
        let (south, north) = comm.cart_shift(0, 1)?;
        let (west, east) = comm.cart_shift(1, 1)?;

        Ok(Self::from_layout(
            rank,
            size,
            [ndomy, ndomx],
            [domy, domx],
            [north.into(), east.into(), south.into(), west.into()],
            discretization,
        ))
    }

    /// Geometry from an already-known layout. `neighbors` is ordered
    /// north, east, south, west.
    pub fn from_layout(
        rank: usize,
        size: usize,
        [ndomy, ndomx]: [usize; 2],
        [domy, domx]: [usize; 2],
        neighbors: [Neighbor; 4],
        discretization: &GridDiscretization,
    ) -> Self {
        let even_nx = discretization.nx / ndomx;
        let even_ny = discretization.ny / ndomy;

        // offsets use the even share so the remainder never moves earlier ranks
        let startx = domx * even_nx;
        let starty = domy * even_ny;
        let nx = if domx == ndomx - 1 {
            discretization.nx - startx
        } else {
            even_nx
        };
        let ny = if domy == ndomy - 1 {
            discretization.ny - starty
        } else {
            even_ny
        };

        let [north, east, south, west] = neighbors;
        let mut boundary = Boundary::empty();
        for (dir, n) in Direction::ALL.into_iter().zip(neighbors) {
            if n.is_boundary() {
                boundary |= dir.flag();
            }
        }

        Self {
            ndomy,
            ndomx,
            domy,
            domx,
            neighbor_north: north,
            neighbor_south: south,
            neighbor_east: east,
            neighbor_west: west,
            boundary,
            nx,
            ny,
            startx,
            starty,
            endx: startx + nx - 1,
            endy: starty + ny - 1,
            n_total: nx * ny,
            rank,
            size,
        }
    }

    pub fn neighbor(&self, dir: Direction) -> Neighbor {
        match dir {
            Direction::North => self.neighbor_north,
            Direction::East => self.neighbor_east,
            Direction::South => self.neighbor_south,
            Direction::West => self.neighbor_west,
        }
    }

    /// Number of values along the edge facing `dir`.
    pub fn edge_len(&self, dir: Direction) -> usize {
        match dir {
            Direction::North | Direction::South => self.nx,
            Direction::East | Direction::West => self.ny,
        }
    }

    pub fn on_global_boundary(&self, dir: Direction) -> bool {
        self.boundary.contains(dir.flag())
    }
}

impl fmt::Display for ProcessSubdomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rank {}/{}", self.rank, self.size)?;
        writeln!(f, "At index ({},{})", self.domy, self.domx)?;
        writeln!(f, "Neigh N:S {}:{}", self.neighbor_north, self.neighbor_south)?;
        writeln!(f, "Neigh E:W {}:{}", self.neighbor_east, self.neighbor_west)?;
        writeln!(f, "Startx:endx {}:{}", self.startx, self.endx)?;
        writeln!(f, "Starty:endy {}:{}", self.starty, self.endy)?;
        write!(f, "Local dims {} x {}", self.nx, self.ny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ThreadComm;

    #[test]
    fn create_dim_examples() {
        assert_eq!(create_dim(12).unwrap(), (4, 3));
        assert_eq!(create_dim(13).unwrap(), (13, 1));
        assert_eq!(create_dim(1).unwrap(), (1, 1));
        assert_eq!(create_dim(4).unwrap(), (2, 2));
        assert_eq!(create_dim(6).unwrap(), (3, 2));
        assert_eq!(create_dim(8).unwrap(), (4, 2));
        assert_eq!(create_dim(16).unwrap(), (4, 4));
        assert!(create_dim(0).is_err());
    }

    #[test]
    fn create_dim_properties() {
        for size in 1..200 {
            let (a, b) = create_dim(size).unwrap();
            assert_eq!(a * b, size);
            assert!(a >= b && b >= 1, "size {size} gave ({a}, {b})");
        }
    }

    #[test]
    fn single_process_owns_everything() {
        let disc = GridDiscretization::new(7, 5, 1, 1.0).unwrap();
        let mut comm = ThreadComm::solo();
        let sd = ProcessSubdomain::build(&mut comm, &disc).unwrap();
        assert_eq!((sd.ndomy, sd.ndomx), (1, 1));
        assert_eq!((sd.nx, sd.ny, sd.n_total), (7, 5, 35));
        assert_eq!((sd.endx, sd.endy), (6, 4));
        assert!(Direction::ALL.iter().all(|&d| sd.neighbor(d).is_boundary()));
        assert!(sd.boundary.is_all());
    }

    #[test]
    fn remainder_goes_to_last_row_and_column() {
        let disc = GridDiscretization::new(10, 7, 1, 1.0).unwrap();
        // 6 ranks -> 3 rows x 2 cols
        let last = ProcessSubdomain::from_layout(
            5,
            6,
            [3, 2],
            [2, 1],
            [Neighbor::Boundary, Neighbor::Boundary, Neighbor::Rank(3), Neighbor::Rank(4)],
            &disc,
        );
        assert_eq!((last.startx, last.nx), (5, 5));
        assert_eq!((last.starty, last.ny), (4, 3));
        assert_eq!(last.boundary, Boundary::NORTH | Boundary::EAST);
        let first = ProcessSubdomain::from_layout(
            0,
            6,
            [3, 2],
            [0, 0],
            [Neighbor::Rank(2), Neighbor::Rank(1), Neighbor::Boundary, Neighbor::Boundary],
            &disc,
        );
        assert_eq!((first.startx, first.nx, first.starty, first.ny), (0, 5, 0, 2));
    }

    #[test]
    fn too_many_processes_for_grid() {
        let disc = GridDiscretization::from_parts(3, 3, 1, 0.1, 0.1, 1.0, 1.0).unwrap();
        let mut comms = ThreadComm::world(4).unwrap();
        // 4 ranks -> 2 x 2 is fine for 3 x 3
        assert!(ProcessSubdomain::build(&mut comms[0], &disc).is_ok());
        let mut comms = ThreadComm::world(5).unwrap();
        // 5 ranks -> 5 x 1 needs ny >= 5
        assert!(ProcessSubdomain::build(&mut comms[0], &disc).is_err());
    }

    #[test]
    fn display_report() {
        let disc = GridDiscretization::new(4, 4, 1, 1.0).unwrap();
        let mut comm = ThreadComm::solo();
        let sd = ProcessSubdomain::build(&mut comm, &disc).unwrap();
        let text = sd.to_string();
        assert!(text.starts_with("Rank 0/1"));
        assert!(text.contains("Neigh N:S -:-"));
        assert!(text.ends_with("Local dims 4 x 4"));
    }
}
