//! Nonlinear diffusion residual with overlapped halo exchange.
//!
//! For every local point the residual is
//!
//! ```text
//! S = -(4 + alpha) U + U_south + U_north + U_west + U_east
//!     + beta U (1 - U) + alpha x_old
//! ```
//!
//! Neighbor values outside the local rectangle come from the halo receive
//! buffers when a neighbor rank exists; on a global boundary side the term is
//! dropped (open boundary).
//!
//! An evaluation posts the halo sends/receives, sweeps the strictly interior
//! points while the messages are in flight, waits, and only then computes the
//! edge strips and corners. The result does not depend on how much of the
//! interior sweep actually overlapped the communication.

use crate::core::{Field, NonlinearOperator};
use crate::domain::{Direction, GridDiscretization, HaloBuffers, ProcessSubdomain};
use crate::error::JfnkError;
use crate::parallel::Comm;
use crate::utils::RunStatistics;

/// Flops charged per strictly interior point.
pub const FLOPS_INTERIOR: u64 = 12;
/// Flops charged per boundary point, corners included.
pub const FLOPS_BOUNDARY: u64 = 11;

/// Flop count of one evaluation over an `nx × ny` subdomain.
pub fn flops_per_evaluation(nx: usize, ny: usize) -> u64 {
    let interior = (nx.saturating_sub(2) * ny.saturating_sub(2)) as u64;
    let boundary = (nx * ny) as u64 - interior;
    FLOPS_INTERIOR * interior + FLOPS_BOUNDARY * boundary
}

#[inline(always)]
fn stencil(u: f64, neighbors: f64, x_old: f64, alpha: f64, beta: f64) -> f64 {
    -(4.0 + alpha) * u + neighbors + beta * u * (1.0 - u) + alpha * x_old
}

/// The residual operator of one rank, borrowing that rank's state.
pub struct DiffusionOperator<'a, C: Comm> {
    comm: &'a C,
    subdomain: &'a ProcessSubdomain,
    discretization: &'a GridDiscretization,
    x_old: &'a Field,
    halo: &'a mut HaloBuffers,
    stats: &'a mut RunStatistics,
}

impl<'a, C: Comm> DiffusionOperator<'a, C> {
    pub fn new(
        comm: &'a C,
        subdomain: &'a ProcessSubdomain,
        discretization: &'a GridDiscretization,
        x_old: &'a Field,
        halo: &'a mut HaloBuffers,
        stats: &'a mut RunStatistics,
    ) -> Self {
        Self {
            comm,
            subdomain,
            discretization,
            x_old,
            halo,
            stats,
        }
    }

    fn check_shape(&self, f: &Field) -> Result<(), JfnkError> {
        if f.nx() != self.subdomain.nx || f.ny() != self.subdomain.ny {
            return Err(JfnkError::ShapeMismatch {
                expected: (self.subdomain.ny, self.subdomain.nx),
                got: (f.ny(), f.nx()),
            });
        }
        Ok(())
    }

    /// s ← F(u). Must be called by every rank together.
    pub fn evaluate(&mut self, u: &Field, s: &mut Field) -> Result<(), JfnkError> {
        self.check_shape(u)?;
        self.check_shape(s)?;
        self.check_shape(self.x_old)?;

        let alpha = self.discretization.alpha;
        let beta = self.discretization.beta;
        let x_old = self.x_old;

        {
            let mut transfers = self.halo.transfers(self.subdomain, u);
            self.comm
                .halo_exchange(&mut transfers, || interior(u, x_old, s, alpha, beta))?;
        }
        boundary(u, x_old, s, self.halo, alpha, beta);

        self.stats
            .add_flops(flops_per_evaluation(self.subdomain.nx, self.subdomain.ny));
        Ok(())
    }
}

impl<C: Comm> NonlinearOperator<Field> for DiffusionOperator<'_, C> {
    fn apply(&mut self, u: &Field, out: &mut Field) -> Result<(), JfnkError> {
        self.evaluate(u, out)
    }
}

/// Rows 1..ny-1, columns 1..nx-1: local data only.
fn interior(u: &Field, x_old: &Field, s: &mut Field, alpha: f64, beta: f64) {
    let (nx, ny) = (u.nx(), u.ny());
    if nx < 3 || ny < 3 {
        return;
    }
    let rows = &mut s.as_mut_slice()[nx..(ny - 1) * nx];

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        rows.par_chunks_mut(nx)
            .enumerate()
            .for_each(|(k, out)| interior_row(u, x_old, k + 1, out, alpha, beta));
    }
    #[cfg(not(feature = "rayon"))]
    {
        rows.chunks_mut(nx)
            .enumerate()
            .for_each(|(k, out)| interior_row(u, x_old, k + 1, out, alpha, beta));
    }
}

fn interior_row(u: &Field, x_old: &Field, j: usize, out: &mut [f64], alpha: f64, beta: f64) {
    let nx = u.nx();
    let (south, here, north) = (u.row(j - 1), u.row(j), u.row(j + 1));
    let old = x_old.row(j);
    for i in 1..nx - 1 {
        let neighbors = south[i] + north[i] + here[i - 1] + here[i + 1];
        out[i] = stencil(here[i], neighbors, old[i], alpha, beta);
    }
}

/// Outermost rows and columns, corners included. Reads the halo, so it runs
/// only after the exchange has completed.
fn boundary(u: &Field, x_old: &Field, s: &mut Field, halo: &HaloBuffers, alpha: f64, beta: f64) {
    let (nx, ny) = (u.nx(), u.ny());
    let bnd_n = halo.incoming(Direction::North);
    let bnd_s = halo.incoming(Direction::South);
    let bnd_e = halo.incoming(Direction::East);
    let bnd_w = halo.incoming(Direction::West);

    let mut point = |j: usize, i: usize| {
        let south = if j > 0 { u[(j - 1, i)] } else { bnd_s.map_or(0.0, |b| b[i]) };
        let north = if j + 1 < ny { u[(j + 1, i)] } else { bnd_n.map_or(0.0, |b| b[i]) };
        let west = if i > 0 { u[(j, i - 1)] } else { bnd_w.map_or(0.0, |b| b[j]) };
        let east = if i + 1 < nx { u[(j, i + 1)] } else { bnd_e.map_or(0.0, |b| b[j]) };
        s[(j, i)] = stencil(u[(j, i)], south + north + west + east, x_old[(j, i)], alpha, beta);
    };

    for i in 0..nx {
        point(0, i);
        if ny > 1 {
            point(ny - 1, i);
        }
    }
    for j in 1..ny.saturating_sub(1) {
        point(j, 0);
        if nx > 1 {
            point(j, nx - 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ThreadComm;
    use approx::assert_abs_diff_eq;

    struct Rank {
        comm: ThreadComm,
        disc: GridDiscretization,
        sd: ProcessSubdomain,
        halo: HaloBuffers,
        stats: RunStatistics,
    }

    fn solo(nx: usize, ny: usize, r: f64) -> Rank {
        let disc = GridDiscretization::new(nx, ny, 10, 0.1)
            .unwrap()
            .with_parameters(r, 1.0)
            .unwrap();
        let mut comm = ThreadComm::solo();
        let sd = ProcessSubdomain::build(&mut comm, &disc).unwrap();
        let halo = HaloBuffers::new(&sd);
        Rank {
            comm,
            disc,
            sd,
            halo,
            stats: RunStatistics::default(),
        }
    }

    #[test]
    fn constant_field_closed_form() {
        let c = 0.3;
        let mut rk = solo(6, 5, 0.0);
        let u = Field::filled(6, 5, c);
        let x_old = Field::filled(6, 5, c);
        let mut s = Field::zeros(6, 5);
        DiffusionOperator::new(&rk.comm, &rk.sd, &rk.disc, &x_old, &mut rk.halo, &mut rk.stats)
            .evaluate(&u, &mut s)
            .unwrap();
        for j in 0..5 {
            for i in 0..6 {
                let missing = [j == 0, j == 4, i == 0, i == 5].iter().filter(|&&m| m).count();
                // -(4+a)c + (4-missing)c + a c
                let expected = -(missing as f64) * c;
                assert_abs_diff_eq!(s[(j, i)], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn reaction_term_on_constant_field() {
        let c = 0.25;
        let mut rk = solo(5, 5, 1000.0);
        let beta = rk.disc.beta;
        let u = Field::filled(5, 5, c);
        let x_old = Field::filled(5, 5, c);
        let mut s = Field::zeros(5, 5);
        DiffusionOperator::new(&rk.comm, &rk.sd, &rk.disc, &x_old, &mut rk.halo, &mut rk.stats)
            .evaluate(&u, &mut s)
            .unwrap();
        assert_abs_diff_eq!(s[(2, 2)], beta * c * (1.0 - c), epsilon = 1e-9);
        assert_abs_diff_eq!(s[(0, 0)], beta * c * (1.0 - c) - 2.0 * c, epsilon = 1e-9);
    }

    #[test]
    fn flop_counter_closed_form() {
        let (nx, ny) = (7, 4);
        let mut rk = solo(nx, ny, 1000.0);
        let u = Field::filled(nx, ny, 0.1);
        let x_old = Field::zeros(nx, ny);
        let mut s = Field::zeros(nx, ny);
        let mut op = DiffusionOperator::new(&rk.comm, &rk.sd, &rk.disc, &x_old, &mut rk.halo, &mut rk.stats);
        op.evaluate(&u, &mut s).unwrap();
        op.evaluate(&u, &mut s).unwrap();
        let one = 12 * (nx as u64 - 2) * (ny as u64 - 2)
            + 11 * 2 * ((nx as u64 - 2) + (ny as u64 - 2))
            + 11 * 4;
        assert_eq!(flops_per_evaluation(nx, ny), one);
        assert_eq!(rk.stats.flops, 2 * one);
    }

    #[test]
    fn thin_subdomains_are_all_boundary() {
        assert_eq!(flops_per_evaluation(1, 5), 11 * 5);
        assert_eq!(flops_per_evaluation(2, 2), 11 * 4);
        let mut rk = solo(2, 1, 0.0);
        let u = Field::from_vec(2, 1, vec![1.0, 2.0]).unwrap();
        let x_old = Field::zeros(2, 1);
        let mut s = Field::zeros(2, 1);
        DiffusionOperator::new(&rk.comm, &rk.sd, &rk.disc, &x_old, &mut rk.halo, &mut rk.stats)
            .evaluate(&u, &mut s)
            .unwrap();
        let a = rk.disc.alpha;
        assert_abs_diff_eq!(s[(0, 0)], -(4.0 + a) * 1.0 + 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s[(0, 1)], -(4.0 + a) * 2.0 + 1.0, epsilon = 1e-12);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut rk = solo(4, 4, 0.0);
        let u = Field::zeros(3, 4);
        let x_old = Field::zeros(4, 4);
        let mut s = Field::zeros(4, 4);
        let err = DiffusionOperator::new(&rk.comm, &rk.sd, &rk.disc, &x_old, &mut rk.halo, &mut rk.stats)
            .evaluate(&u, &mut s);
        assert!(matches!(err, Err(JfnkError::ShapeMismatch { .. })));
        assert_eq!(rk.stats.flops, 0);
    }
}
