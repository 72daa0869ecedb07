use crate::quantum::errors::MeasurementError;
use crate::quantum::utils;
use ndarray::{Array1, Array2, array};
use num_complex::Complex64;

/// A projective single-qubit measurement; outcome `k` is the index of `operators[k]`.
#[derive(Clone, Debug)]
pub struct Measurement {
    pub operators: Vec<Array2<Complex64>>,
}

impl Measurement {
    pub fn new(operators: Vec<Array2<Complex64>>) -> Result<Self, MeasurementError> {
        let fault = if operators.is_empty() {
            Some(MeasurementError::Empty)
        } else if !utils::all_single_qubit(&operators) {
            Some(MeasurementError::InvalidDimensions)
        } else if !utils::check_completeness(&operators) {
            Some(MeasurementError::NotComplete)
        } else {
            None
        };

        match fault {
            Some(err) => Err(err),
            None => Ok(Self { operators }),
        }
    }

    /// Projectors onto |0> and |1>.
    pub fn z_basis() -> Result<Measurement, MeasurementError> {
        let (one, zero) = (Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0));
        let v0: Array1<Complex64> = array![one, zero];
        let v1: Array1<Complex64> = array![zero, one];

        Self::new(vec![
            utils::outer_product(&v0, &v0),
            utils::outer_product(&v1, &v1),
        ])
    }

    /// Number of possible outcomes.
    pub fn outcomes(&self) -> usize {
        self.operators.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_basis_has_two_outcomes() {
        let m = Measurement::z_basis().unwrap();
        assert_eq!(m.outcomes(), 2);
    }

    #[test]
    fn rejects_empty_and_misshapen_sets() {
        assert!(matches!(Measurement::new(vec![]), Err(MeasurementError::Empty)));
        assert!(matches!(
            Measurement::new(vec![Array2::eye(3)]),
            Err(MeasurementError::InvalidDimensions)
        ));
    }

    #[test]
    fn rejects_incomplete_set() {
        let m = Measurement::z_basis().unwrap();
        let partial = vec![m.operators[0].clone()];
        assert!(matches!(
            Measurement::new(partial),
            Err(MeasurementError::NotComplete)
        ));
    }
}
