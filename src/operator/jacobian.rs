//! Explicit finite-difference Jacobian, for checking the matrix-free path.
//!
//! Column `k` is `(F(x + eps·e_k) − F(x)) / eps`, the same forward
//! difference the Krylov solvers apply along arbitrary directions. It costs
//! one operator evaluation per unknown, so it is only meant for small
//! single-rank problems.

use faer::Mat;

use crate::core::{Field, NonlinearOperator};
use crate::error::JfnkError;

pub fn assemble_dense<O: NonlinearOperator<Field>>(
    op: &mut O,
    at: &Field,
    eps: f64,
) -> Result<Mat<f64>, JfnkError> {
    let n = at.len();
    let mut f0 = Field::zeros(at.nx(), at.ny());
    op.apply(at, &mut f0)?;

    let mut probe = at.clone();
    let mut f1 = f0.clone();
    // column-major, like faer
    let mut data = Vec::with_capacity(n * n);
    for k in 0..n {
        let orig = probe.as_slice()[k];
        probe.as_mut_slice()[k] = orig + eps;
        op.apply(&probe, &mut f1)?;
        probe.as_mut_slice()[k] = orig;
        data.extend(
            f1.as_slice()
                .iter()
                .zip(f0.as_slice())
                .map(|(a, b)| (a - b) / eps),
        );
    }
    Ok(Mat::from_fn(n, n, |i, j| data[j * n + i]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// F(u)_k = u_k² + u_{k+1}
    struct Toy;
    impl NonlinearOperator<Field> for Toy {
        fn apply(&mut self, u: &Field, out: &mut Field) -> Result<(), JfnkError> {
            let x = u.as_slice();
            let n = x.len();
            for (k, o) in out.as_mut_slice().iter_mut().enumerate() {
                *o = x[k] * x[k] + if k + 1 < n { x[k + 1] } else { 0.0 };
            }
            Ok(())
        }
    }

    #[test]
    fn recovers_analytic_jacobian() {
        let at = Field::from_vec(3, 1, vec![1.0, 2.0, 3.0]).unwrap();
        let j = assemble_dense(&mut Toy, &at, 1e-7).unwrap();
        let expected = [[2.0, 1.0, 0.0], [0.0, 4.0, 1.0], [0.0, 0.0, 6.0]];
        for (i, row) in expected.iter().enumerate() {
            for (k, &e) in row.iter().enumerate() {
                assert_abs_diff_eq!(j[(i, k)], e, epsilon = 1e-5);
            }
        }
    }
}
