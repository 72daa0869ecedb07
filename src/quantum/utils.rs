//! Matrix helpers for single-qubit operators.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

/// Dimension of a single-qubit Hilbert space.
pub const QUBIT_DIM: usize = 2;

/// Builds a 2x2 operator from its rows.
pub fn matrix2(rows: [[Complex64; QUBIT_DIM]; QUBIT_DIM]) -> Array2<Complex64> {
    Array2::from_shape_fn((QUBIT_DIM, QUBIT_DIM), |(i, j)| rows[i][j])
}

/// Computes the trace of a matrix (sum of diagonal elements).
pub fn trace(matrix: &Array2<Complex64>) -> Complex64 {
    matrix.diag().sum()
}

/// Conjugate transpose $A^\dagger$.
pub fn dagger(matrix: &Array2<Complex64>) -> Array2<Complex64> {
    matrix.t().mapv(|c| c.conj())
}

/// Computes $A \rho A^\dagger$.
pub fn sandwich(op: &Array2<Complex64>, rho: &Array2<Complex64>) -> Array2<Complex64> {
    op.dot(rho).dot(&dagger(op))
}

/// Computes the outer product of two vectors $|a\rangle\langle b|$.
pub fn outer_product(a: &Array1<Complex64>, b: &Array1<Complex64>) -> Array2<Complex64> {
    let mut res = Array2::zeros((a.len(), b.len()));
    for ((i, j), cell) in res.indexed_iter_mut() {
        *cell = a[i] * b[j].conj();
    }
    res
}

/// Checks that every operator is a 2x2 matrix.
pub fn all_single_qubit(ops: &[Array2<Complex64>]) -> bool {
    ops.iter().all(|op| op.dim() == (QUBIT_DIM, QUBIT_DIM))
}

/// Checks completeness relation for Kraus or measurement operators.
///
/// Verifies if $\sum M_k^\dagger M_k = I$.
pub fn check_completeness(ops: &[Array2<Complex64>]) -> bool {
    let eye = Array2::<Complex64>::eye(QUBIT_DIM);
    let sum = ops
        .iter()
        .fold(Array2::<Complex64>::zeros((QUBIT_DIM, QUBIT_DIM)), |acc, op| {
            acc + dagger(op).dot(op)
        });
    sum.iter()
        .zip(eye.iter())
        .all(|(a, b)| (a - b).norm() < 1e-9)
}
