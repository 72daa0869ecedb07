use crate::quantum::channels::NoiseChannel;
use crate::quantum::errors::StateError;
use crate::quantum::gates::Gate;
use crate::quantum::measurements::Measurement;
use crate::quantum::utils::{self, QUBIT_DIM, trace};
use ndarray::Array2;
use num_complex::Complex64;
use rand::Rng;

/// A single qubit held as a 2x2 density matrix.
#[derive(Clone, Debug)]
pub struct QubitState {
    pub density_matrix: Array2<Complex64>,
}

impl Default for QubitState {
    fn default() -> Self {
        Self::new()
    }
}

impl QubitState {
    /// Creates a new qubit initialized to |0>.
    pub fn new() -> Self {
        let mut density_matrix = Array2::<Complex64>::zeros((QUBIT_DIM, QUBIT_DIM));
        density_matrix[[0, 0]] = Complex64::new(1.0, 0.0);

        Self { density_matrix }
    }

    /// Checks that the density matrix still has unit trace.
    pub fn is_valid(&self) -> Result<(), StateError> {
        let tr = trace(&self.density_matrix);
        if (tr - Complex64::new(1.0, 0.0)).norm() > 1e-9 {
            return Err(StateError::InvalidTrace(tr));
        }
        Ok(())
    }

    /// Applies a unitary gate: rho -> U rho U†
    pub fn apply(&mut self, gate: &Gate) {
        self.density_matrix = utils::sandwich(&gate.matrix, &self.density_matrix);
    }

    /// Apply NoiseChannel to the qubit: rho -> sum_k K rho K†
    pub fn apply_channel(&mut self, channel: &NoiseChannel) {
        let mut new_rho = Array2::<Complex64>::zeros((QUBIT_DIM, QUBIT_DIM));
        for k in &channel.kraus_ops {
            new_rho += &utils::sandwich(k, &self.density_matrix);
        }
        self.density_matrix = new_rho;
    }

    /// Returns the probability of each measurement outcome
    pub fn probabilities(&self, measurement: &Measurement) -> Vec<f64> {
        let mut probs: Vec<f64> = measurement
            .operators
            .iter()
            .map(|op| trace(&utils::sandwich(op, &self.density_matrix)).re.max(0.0))
            .collect();

        // Due to float, renormalization of probabilities to ensure completeness
        let sum: f64 = probs.iter().sum();
        if sum > 0.0 {
            for p in &mut probs {
                *p /= sum;
            }
        }
        probs
    }

    /// Randomly selects outcome index ponderating using `probs`
    fn pick_outcome<R: Rng + ?Sized>(probs: &[f64], rng: &mut R) -> usize {
        let roll: f64 = rng.random();

        let mut cumulative = 0.0;
        for (i, &p) in probs.iter().enumerate() {
            cumulative += p;
            if roll < cumulative {
                return i;
            }
        }
        probs.len().saturating_sub(1)
    }

    /// Physical measurement which collapses the state irretrievably.
    pub fn measure<R: Rng + ?Sized>(
        &mut self,
        measurement: &Measurement,
        rng: &mut R,
    ) -> Result<usize, StateError> {
        self.is_valid()?;

        let probs = self.probabilities(measurement);
        let outcome = Self::pick_outcome(&probs, rng);
        let p_selected = probs[outcome];

        if p_selected <= 1e-12 {
            return Err(StateError::VanishingOutcome {
                index: outcome,
                probability: p_selected,
            });
        }

        // rho' = (M_k * rho * M_k†) / p_k
        let collapsed = utils::sandwich(&measurement.operators[outcome], &self.density_matrix);
        self.density_matrix = collapsed.mapv(|val| val / Complex64::new(p_selected, 0.0));

        Ok(outcome)
    }
}
