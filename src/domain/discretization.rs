//! Global grid and model parameters, shared read-only by every rank.

use crate::error::JfnkError;

/// Reaction coefficient used when none is given.
pub const DEFAULT_REACTION: f64 = 1000.0;
/// Diffusion coefficient used when none is given.
pub const DEFAULT_DIFFUSION: f64 = 1.0;

#[derive(Clone, Debug, PartialEq)]
pub struct GridDiscretization {
    /// Horizontal grid points.
    pub nx: usize,
    /// Vertical grid points.
    pub ny: usize,
    /// Number of time steps.
    pub nt: usize,
    /// Distance between grid points.
    pub dx: f64,
    /// Time step size.
    pub dt: f64,
    /// Reaction coefficient R.
    pub r: f64,
    /// Diffusion coefficient D.
    pub d: f64,
    /// dx²/(D·dt)
    pub alpha: f64,
    /// R·dx²/D
    pub beta: f64,
}

impl GridDiscretization {
    /// Unit square sampled by `nx` points across, integrated to `final_time`
    /// in `nt` steps, with the default reaction and diffusion coefficients.
    pub fn new(nx: usize, ny: usize, nt: usize, final_time: f64) -> Result<Self, JfnkError> {
        if nx < 2 {
            return Err(JfnkError::InvalidDiscretization(format!(
                "need at least 2 horizontal points to define dx, got {nx}"
            )));
        }
        if nt == 0 {
            return Err(JfnkError::InvalidDiscretization(
                "number of time steps must be positive".to_string(),
            ));
        }
        let dx = 1.0 / (nx - 1) as f64;
        let dt = final_time / nt as f64;
        Self::from_parts(nx, ny, nt, dx, dt, DEFAULT_REACTION, DEFAULT_DIFFUSION)
    }

    pub fn from_parts(
        nx: usize,
        ny: usize,
        nt: usize,
        dx: f64,
        dt: f64,
        r: f64,
        d: f64,
    ) -> Result<Self, JfnkError> {
        if nx == 0 || ny == 0 {
            return Err(JfnkError::InvalidDiscretization(format!(
                "grid extents must be positive, got {nx} x {ny}"
            )));
        }
        if nt == 0 {
            return Err(JfnkError::InvalidDiscretization(
                "number of time steps must be positive".to_string(),
            ));
        }
        for (name, v) in [("dx", dx), ("dt", dt), ("d", d)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(JfnkError::InvalidDiscretization(format!(
                    "{name} must be positive and finite, got {v}"
                )));
            }
        }
        if !r.is_finite() {
            return Err(JfnkError::InvalidDiscretization(format!(
                "r must be finite, got {r}"
            )));
        }
        Ok(Self {
            nx,
            ny,
            nt,
            dx,
            dt,
            r,
            d,
            alpha: dx * dx / (d * dt),
            beta: r * dx * dx / d,
        })
    }

    /// Same grid with different reaction/diffusion coefficients.
    pub fn with_parameters(&self, r: f64, d: f64) -> Result<Self, JfnkError> {
        Self::from_parts(self.nx, self.ny, self.nt, self.dx, self.dt, r, d)
    }

    pub fn n_total(&self) -> usize {
        self.nx * self.ny
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn derived_coefficients() {
        let disc = GridDiscretization::new(11, 11, 100, 0.01).unwrap();
        assert_relative_eq!(disc.dx, 0.1);
        assert_relative_eq!(disc.dt, 1e-4);
        assert_relative_eq!(disc.alpha, 0.01 / 1e-4, max_relative = 1e-12);
        assert_relative_eq!(disc.beta, 1000.0 * 0.01, max_relative = 1e-12);
    }

    #[test]
    fn with_parameters_recomputes() {
        let disc = GridDiscretization::new(5, 5, 10, 1.0).unwrap();
        let pure = disc.with_parameters(0.0, 2.0).unwrap();
        assert_eq!(pure.beta, 0.0);
        assert_relative_eq!(pure.alpha, disc.alpha / 2.0, max_relative = 1e-12);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert!(GridDiscretization::new(1, 5, 10, 1.0).is_err());
        assert!(GridDiscretization::new(5, 0, 10, 1.0).is_err());
        assert!(GridDiscretization::new(5, 5, 0, 1.0).is_err());
        assert!(GridDiscretization::new(5, 5, 10, -1.0).is_err());
        assert!(GridDiscretization::from_parts(5, 5, 1, 0.1, 0.1, f64::NAN, 1.0).is_err());
    }
}
