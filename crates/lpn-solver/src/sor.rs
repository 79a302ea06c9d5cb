//! Successive over-relaxation pre-solver.
//!
//! An iterative alternative for sparse systems with no particular
//! structure. The orchestrator may attempt SOR before the direct LDLᵀ
//! path and falls back when it does not converge.

use nalgebra::{DMatrix, DVector};

/// Diagonal acceptance floor: the conditioning pass guarantees healthy
/// diagonals are at least machine-epsilon · 1e-15, so anything below
/// epsilon² is an unusable pivot.
const CONDITION: f64 = f64::EPSILON * f64::EPSILON;

/// Heuristic positive-definiteness gate: accepts when every diagonal is
/// above the condition floor.
///
/// This is not the true z·Az > 0 definition (e.g. [1, -1; -1, 1] passes);
/// the solve itself only needs non-vanishing diagonals, which this does
/// guarantee.
pub fn is_positive_definite(a: &DMatrix<f64>, n: usize) -> bool {
    (0..n).all(|i| a[(i, i)] >= CONDITION)
}

/// Solve A·x = b by SOR, starting from the caller's `x`.
///
/// `weight` in (0, 1] accelerates convergence; 1 reduces to Gauss-Seidel.
/// Returns the iteration count on convergence, or `None` when `max_iter`
/// is exhausted. On failure `x` holds the last unconverged iterate and
/// the caller must restore a previous solution.
pub fn solve(
    x: &mut DVector<f64>,
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    n: usize,
    weight: f64,
    max_iter: usize,
    tolerance: f64,
) -> Option<usize> {
    if !is_positive_definite(a, n) {
        return None;
    }

    for iteration in 1..max_iter {
        let mut error_sum = 0.0;
        for i in 0..n {
            // Split the row product into already-updated and prior terms.
            let mut low = 0.0;
            for j in 0..i {
                low += a[(i, j)] * x[j];
            }
            let mut high = 0.0;
            for j in i + 1..n {
                high += a[(i, j)] * x[j];
            }

            let trial = (1.0 - weight) * x[i] + (weight / a[(i, i)]) * (b[i] - low - high);
            error_sum += (trial - x[i]).abs();
            x[i] = trial;
        }

        if error_sum < tolerance * n as f64 {
            return Some(iteration);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd_system() -> (DMatrix<f64>, DVector<f64>) {
        let a = DMatrix::from_row_slice(
            3,
            3,
            &[4.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 4.0],
        );
        let b = DVector::from_row_slice(&[1.0, 5.0, 0.0]);
        (a, b)
    }

    #[test]
    fn converges_on_diagonally_dominant_system() {
        let (a, b) = spd_system();
        let mut x = DVector::zeros(3);
        let iterations = solve(&mut x, &a, &b, 3, 1.0, 100, 1.0e-12).expect("SOR converged");
        assert!(iterations < 100);
        let residual = &a * &x - &b;
        assert!(residual.amax() < 1e-9);
    }

    #[test]
    fn fails_within_iteration_budget() {
        let (a, b) = spd_system();
        let mut x = DVector::zeros(3);
        assert!(solve(&mut x, &a, &b, 3, 1.0, 2, 1.0e-15).is_none());
    }

    #[test]
    fn rejects_zero_diagonal() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let b = DVector::from_row_slice(&[1.0, 1.0]);
        let mut x = DVector::zeros(2);
        assert!(solve(&mut x, &a, &b, 2, 1.0, 100, 1.0e-12).is_none());
    }

    #[test]
    fn positive_definite_gate_is_diagonal_only() {
        // The acknowledged limitation: this matrix is not positive
        // definite but passes the diagonal test.
        let a = DMatrix::from_row_slice(2, 2, &[1.0, -1.0, -1.0, 1.0]);
        assert!(is_positive_definite(&a, 2));
    }
}
