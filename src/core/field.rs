//! Dense local 2D field over a subdomain.
//!
//! Storage is row-major: row `j` is the y index (row 0 is the south edge),
//! column `i` is the x index (column 0 is the west edge). Ghost cells are not
//! stored; neighbor data lives in [`crate::domain::HaloBuffers`].

use std::ops::{Index, IndexMut};

use crate::error::JfnkError;

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    nx: usize,
    ny: usize,
    data: Vec<f64>,
}

impl Field {
    /// A `ny × nx` field of zeros.
    pub fn zeros(nx: usize, ny: usize) -> Self {
        Self::filled(nx, ny, 0.0)
    }

    pub fn filled(nx: usize, ny: usize, value: f64) -> Self {
        Self {
            nx,
            ny,
            data: vec![value; nx * ny],
        }
    }

    /// Build a field from `f(row, col)`.
    pub fn from_fn(nx: usize, ny: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                data.push(f(j, i));
            }
        }
        Self { nx, ny, data }
    }

    /// Wrap row-major storage.
    pub fn from_vec(nx: usize, ny: usize, data: Vec<f64>) -> Result<Self, JfnkError> {
        if data.len() != nx * ny {
            return Err(JfnkError::LengthMismatch {
                expected: nx * ny,
                got: data.len(),
            });
        }
        Ok(Self { nx, ny, data })
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn row(&self, j: usize) -> &[f64] {
        &self.data[j * self.nx..(j + 1) * self.nx]
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    /// Fails unless `other` has the same shape.
    pub fn ensure_same_shape(&self, other: &Field) -> Result<(), JfnkError> {
        if self.nx != other.nx || self.ny != other.ny {
            return Err(JfnkError::ShapeMismatch {
                expected: (self.ny, self.nx),
                got: (other.ny, other.nx),
            });
        }
        Ok(())
    }

    pub fn copy_from(&mut self, other: &Field) {
        assert_eq!(self.data.len(), other.data.len(), "Fields must have the same shape");
        self.data.copy_from_slice(&other.data);
    }

    /// self ← a·x
    pub fn scaled_copy(&mut self, a: f64, x: &Field) {
        assert_eq!(self.data.len(), x.data.len(), "Fields must have the same shape");
        for (s, &xi) in self.data.iter_mut().zip(&x.data) {
            *s = a * xi;
        }
    }

    /// self ← self + a·x
    pub fn axpy(&mut self, a: f64, x: &Field) {
        assert_eq!(self.data.len(), x.data.len(), "Fields must have the same shape");
        for (s, &xi) in self.data.iter_mut().zip(&x.data) {
            *s += a * xi;
        }
    }

    /// self ← a·x + b·y
    pub fn lcomb(&mut self, a: f64, x: &Field, b: f64, y: &Field) {
        assert_eq!(self.data.len(), x.data.len(), "Fields must have the same shape");
        assert_eq!(self.data.len(), y.data.len(), "Fields must have the same shape");
        for ((s, &xi), &yi) in self.data.iter_mut().zip(&x.data).zip(&y.data) {
            *s = a * xi + b * yi;
        }
    }

    /// self ← x + b·self
    pub fn xpby(&mut self, x: &Field, b: f64) {
        assert_eq!(self.data.len(), x.data.len(), "Fields must have the same shape");
        for (s, &xi) in self.data.iter_mut().zip(&x.data) {
            *s = xi + b * *s;
        }
    }

    /// Local (unreduced) dot product.
    pub fn local_dot(&self, other: &Field) -> f64 {
        assert_eq!(self.data.len(), other.data.len(), "Fields must have the same shape");
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a * b)
            .fold(0.0, |acc, v| acc + v)
    }

    /// Local (unreduced) sum of squares.
    pub fn local_sum_sq(&self) -> f64 {
        self.data.iter().map(|v| v * v).fold(0.0, |acc, v| acc + v)
    }
}

impl Index<(usize, usize)> for Field {
    type Output = f64;

    /// `field[(row, col)]`
    fn index(&self, (j, i): (usize, usize)) -> &f64 {
        debug_assert!(j < self.ny && i < self.nx);
        &self.data[j * self.nx + i]
    }
}

impl IndexMut<(usize, usize)> for Field {
    fn index_mut(&mut self, (j, i): (usize, usize)) -> &mut f64 {
        debug_assert!(j < self.ny && i < self.nx);
        &mut self.data[j * self.nx + i]
    }
}
