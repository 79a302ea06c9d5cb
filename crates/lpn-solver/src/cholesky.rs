//! In-place symmetric LDLᵀ factorization and triangular solves.
//!
//! Decomposes a positive definite symmetric matrix A into a unit lower
//! triangular L, a diagonal D, and Lᵀ, all stored in place of A: L in
//! the strict lower triangle, D on the diagonal, Lᵀ in the strict upper
//! triangle. All routines operate on the top-left `n`×`n` block so the
//! same scratch matrix serves islands of any size.

use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};

/// Magnitude below which inner-product operands are treated as zero.
/// Skipping the multiply and snapping results to zero keeps denormals
/// out of the factorization; the tiny potential offset is negligible.
const UNDERFLOW_LIMIT: f64 = 1.0e-100;

/// Factor the top-left `n`×`n` block of `a` into LDLᵀ in place.
///
/// Evaluates, for i = 0..n:
///   L[i][j]·D[j] = A[i][j] − Σ_{k<j} (L[i][k]·D[k])·L[j][k]
///   D[i] = A[i][i] − Σ_{k<i} (L[i][k]·D[k])·L[i][k]
/// then normalizes L[i][k] and mirrors it into the upper triangle.
///
/// A non-positive pivot fails with the offending row number.
pub fn decompose(a: &mut DMatrix<f64>, n: usize) -> SolverResult<()> {
    for i in 1..n {
        // Accumulate the products L[i][j]*D[j].
        for j in 0..i {
            let mut value = a[(i, j)];
            for k in 0..j {
                let lik = a[(i, k)];
                let ljk = a[(j, k)];
                if lik.abs() >= UNDERFLOW_LIMIT || ljk.abs() >= UNDERFLOW_LIMIT {
                    value -= lik * ljk;
                }
            }
            if value.abs() < UNDERFLOW_LIMIT {
                value = 0.0;
            }
            a[(i, j)] = value;
        }

        // Normalize to L[i][k], fold into D[i], and mirror the transpose.
        let mut pivot = a[(i, i)];
        for k in 0..i {
            let ld = a[(i, k)] / a[(k, k)];
            pivot -= a[(i, k)] * ld;
            a[(i, k)] = ld;
            a[(k, i)] = ld;
        }
        a[(i, i)] = pivot;

        if pivot <= 0.0 {
            return Err(SolverError::Numerical {
                what: format!("decomposition failed at row {i}"),
            });
        }
    }
    Ok(())
}

/// Solve A·x = b for the factored top-left `n`×`n` block: forward
/// substitution through L, the diagonal division, then back substitution
/// through Lᵀ.
pub fn solve(
    ldu: &DMatrix<f64>,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
    n: usize,
) -> SolverResult<()> {
    if n == 0 {
        return Ok(());
    }

    // L·y = b (unit lower triangular).
    x[0] = b[0];
    for k in 1..n {
        let mut value = b[k];
        for i in 0..k {
            value -= x[i] * ldu[(k, i)];
        }
        x[k] = value;
    }

    // D·z = y.
    for k in 0..n {
        let d = ldu[(k, k)];
        if d == 0.0 {
            return Err(SolverError::Numerical {
                what: format!("solve failed at row {k}"),
            });
        }
        x[k] /= d;
    }

    // Lᵀ·x = z (unit upper triangular).
    for k in (0..n.saturating_sub(1)).rev() {
        let mut value = x[k];
        for i in k + 1..n {
            value -= x[i] * ldu[(k, i)];
        }
        x[k] = value;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix4() -> DMatrix<f64> {
        // The conductance pattern of a lightly-coupled four-node network.
        DMatrix::from_row_slice(
            4,
            4,
            &[
                10.0, -1.0e-3, 0.0, 0.0, //
                -1.0e-3, 8.0, -2.0e-3, 0.0, //
                0.0, -2.0e-3, 12.0, -1.5e-3, //
                0.0, 0.0, -1.5e-3, 9.0,
            ],
        )
    }

    #[test]
    fn decompose_and_solve_recovers_known_solution() {
        let a0 = matrix4();
        let mut a = a0.clone();
        decompose(&mut a, 4).unwrap();

        let b = DVector::from_row_slice(&[27.0, 0.03, 0.0, -1.5]);
        let mut x = DVector::zeros(4);
        solve(&a, &b, &mut x, 4).unwrap();

        let residual = &a0 * &x - &b;
        assert!(residual.amax() < 1e-12 * b.amax(), "residual = {residual}");
        assert!((x[0] - 2.7).abs() < 1e-3);
        assert!((x[3] + 0.1667).abs() < 1e-3);
    }

    #[test]
    fn factors_are_unit_triangular_with_mirrored_transpose() {
        let mut a = matrix4();
        decompose(&mut a, 4).unwrap();
        for i in 0..4 {
            for j in 0..i {
                assert_eq!(a[(i, j)], a[(j, i)]);
            }
            assert!(a[(i, i)] > 0.0);
        }
    }

    #[test]
    fn identity_round_trip() {
        let mut a = DMatrix::identity(3, 3);
        decompose(&mut a, 3).unwrap();
        let b = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        let mut x = DVector::zeros(3);
        solve(&a, &b, &mut x, 3).unwrap();
        assert_eq!(x, b);
    }

    #[test]
    fn non_positive_pivot_names_failing_row() {
        // Second leading minor is negative: 1*1 - 2*2 < 0.
        let mut a = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 0.0, 2.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let err = decompose(&mut a, 3).unwrap_err();
        assert!(err.to_string().contains("row 1"), "{err}");
    }

    #[test]
    fn block_decompose_leaves_rest_untouched() {
        let mut a = DMatrix::zeros(4, 4);
        a[(0, 0)] = 4.0;
        a[(0, 1)] = -1.0;
        a[(1, 0)] = -1.0;
        a[(1, 1)] = 4.0;
        a[(3, 3)] = 7.0;
        decompose(&mut a, 2).unwrap();
        assert_eq!(a[(3, 3)], 7.0);

        let b = DVector::from_row_slice(&[1.0, 1.0, 0.0, 0.0]);
        let mut x = DVector::zeros(4);
        solve(&a, &b, &mut x, 2).unwrap();
        // [4 -1; -1 4] x = [1, 1] -> x = [1/3, 1/3]
        assert!((x[0] - 1.0 / 3.0).abs() < 1e-14);
        assert!((x[1] - 1.0 / 3.0).abs() < 1e-14);
    }

    #[test]
    fn larger_spd_system_solves_accurately() {
        // Diagonally dominant symmetric matrix.
        let n = 12;
        let mut a0 = DMatrix::zeros(n, n);
        for i in 0..n {
            a0[(i, i)] = 10.0 + i as f64;
            if i + 1 < n {
                a0[(i, i + 1)] = -1.0;
                a0[(i + 1, i)] = -1.0;
            }
        }
        let expected = DVector::from_fn(n, |i, _| (i as f64) - 3.0);
        let b = &a0 * &expected;

        let mut a = a0.clone();
        decompose(&mut a, n).unwrap();
        let mut x = DVector::zeros(n);
        solve(&a, &b, &mut x, n).unwrap();
        assert!((&x - &expected).amax() < 1e-12);
    }
}
