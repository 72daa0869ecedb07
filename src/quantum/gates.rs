use crate::quantum::errors::GateError;
use crate::quantum::utils::{self, QUBIT_DIM};
use ndarray::Array2;
use num_complex::Complex64;

/// A single-qubit unitary gate.
#[derive(Clone, Debug)]
pub struct Gate {
    /// The 2x2 unitary matrix of the gate.
    pub matrix: Array2<Complex64>,
}

impl Gate {
    /// Fails unless `matrix` is a 2x2 unitary.
    pub fn new(matrix: Array2<Complex64>) -> Result<Self, GateError> {
        let (rows, cols) = matrix.dim();

        if rows != QUBIT_DIM || cols != QUBIT_DIM {
            return Err(GateError::InvalidDimensions { rows, cols });
        }

        if !Self::is_unitary(&matrix) {
            return Err(GateError::NonUnitary);
        }

        Ok(Self { matrix })
    }

    fn is_unitary(matrix: &Array2<Complex64>) -> bool {
        utils::check_completeness(std::slice::from_ref(matrix))
    }

    fn real(rows: [[f64; QUBIT_DIM]; QUBIT_DIM]) -> Result<Gate, GateError> {
        Self::new(utils::matrix2(rows.map(|row| row.map(|x| Complex64::new(x, 0.0)))))
    }

    /// Identity, used to model a qubit idling in transit.
    pub fn i() -> Result<Gate, GateError> {
        Self::real([[1.0, 0.0], [0.0, 1.0]])
    }

    /// Pauli-X (bit flip).
    pub fn x() -> Result<Gate, GateError> {
        Self::real([[0.0, 1.0], [1.0, 0.0]])
    }

    /// Hadamard, the rotation between the rectilinear and diagonal bases.
    pub fn h() -> Result<Gate, GateError> {
        let f = std::f64::consts::FRAC_1_SQRT_2;
        Self::real([[f, f], [f, -f]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_gates_are_unitary() {
        for gate in [Gate::i(), Gate::x(), Gate::h()] {
            assert!(gate.is_ok());
        }
    }

    #[test]
    fn hadamard_is_self_inverse() {
        let h = Gate::h().unwrap().matrix;
        let product = h.dot(&h);
        assert!((product[[0, 0]].re - 1.0).abs() < 1e-12);
        assert!(product[[0, 1]].norm() < 1e-12);
    }

    #[test]
    fn rejects_non_unitary_matrix() {
        assert!(matches!(
            Gate::real([[1.0, 1.0], [0.0, 1.0]]),
            Err(GateError::NonUnitary)
        ));
    }

    #[test]
    fn rejects_wrong_dimensions() {
        let m = Array2::<Complex64>::eye(4);
        assert!(matches!(
            Gate::new(m),
            Err(GateError::InvalidDimensions { rows: 4, cols: 4 })
        ));
    }
}
