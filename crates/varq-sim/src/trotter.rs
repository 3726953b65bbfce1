//! Trotter-Suzuki product-formula evolution operators.
//!
//! Approximates `exp(-i H t)` by splitting the evolution into `n_steps`
//! slices, each evolved exactly under each term in sequence.
//!
//! # First-order Trotter (Lie-Trotter)
//!
//!   exp(-i H t) ≈ [∏_k exp(-i c_k P_k t/n)]^n
//!
//! Error: O(t² / n). Exact for any `n` when all terms commute.
//!
//! # Second-order Trotter (Suzuki-Trotter)
//!
//!   exp(-i H t) ≈ [S₂(t/n)]^n
//!   S₂(τ) = [∏_k exp(-i c_k P_k τ/2)] · [∏_k exp(-i c_{n-k} P_{n-k} τ/2)]
//!
//! Error: O(t³ / n²).
//!
//! Terms are applied in list order, so the first term is the rightmost
//! factor of each slice.

use num_complex::Complex64;
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::hamiltonian::{Hamiltonian, HamiltonianTerm};
use crate::operator::Operator;

/// Trotter product-formula time-evolution operator builder.
#[derive(Debug, Clone)]
pub struct TrotterEvolution {
    hamiltonian: Hamiltonian,
    /// Total evolution time t.
    t: f64,
    /// Number of Trotter steps (repetitions).
    n_steps: usize,
    /// Number of qubits; if None, inferred from the Hamiltonian.
    n_qubits: Option<usize>,
}

impl TrotterEvolution {
    /// Construct a new first- or second-order Trotter builder.
    ///
    /// # Arguments
    /// * `hamiltonian`: the Hamiltonian H = Σ c_k P_k
    /// * `t`: total evolution time
    /// * `n_steps`: number of Trotter slices (higher → more accurate)
    pub fn new(hamiltonian: Hamiltonian, t: f64, n_steps: usize) -> Self {
        Self {
            hamiltonian,
            t,
            n_steps,
            n_qubits: None,
        }
    }

    /// Override the register width.
    ///
    /// By default the width is inferred from the highest qubit index in the
    /// Hamiltonian.
    #[must_use]
    pub fn with_n_qubits(mut self, n: usize) -> Self {
        self.n_qubits = Some(n);
        self
    }

    /// Build the first-order product operator.
    pub fn first_order(&self) -> SimResult<Operator> {
        self.validate()?;
        let n_qubits = self.effective_n_qubits();
        let step_t = self.t / self.n_steps as f64;
        debug!(
            n_terms = self.hamiltonian.n_terms(),
            n_steps = self.n_steps,
            n_qubits,
            "building first-order Trotter operator"
        );

        let slice = self.slice(self.hamiltonian.terms().iter(), step_t, n_qubits)?;
        repeat(&slice, self.n_steps, n_qubits)
    }

    /// Build the second-order (symmetric) product operator.
    pub fn second_order(&self) -> SimResult<Operator> {
        self.validate()?;
        let n_qubits = self.effective_n_qubits();
        let half_t = self.t / (2.0 * self.n_steps as f64);
        debug!(
            n_terms = self.hamiltonian.n_terms(),
            n_steps = self.n_steps,
            n_qubits,
            "building second-order Trotter operator"
        );

        let forward = self.slice(self.hamiltonian.terms().iter(), half_t, n_qubits)?;
        let backward = self.slice(self.hamiltonian.terms().iter().rev(), half_t, n_qubits)?;
        let slice = backward.compose(&forward)?;
        repeat(&slice, self.n_steps, n_qubits)
    }

    fn slice<'a>(
        &self,
        mut terms: impl Iterator<Item = &'a HamiltonianTerm>,
        dt: f64,
        n_qubits: usize,
    ) -> SimResult<Operator> {
        terms.try_fold(Operator::identity(n_qubits), |acc, term| -> SimResult<Operator> {
            term_exponential(term, dt, n_qubits)?.compose(&acc)
        })
    }

    fn validate(&self) -> SimResult<()> {
        if self.hamiltonian.n_terms() == 0 {
            return Err(SimError::EmptyHamiltonian);
        }
        if self.n_steps == 0 {
            return Err(SimError::InvalidSteps(0));
        }
        let n_qubits = self.effective_n_qubits();
        if let Some(q) = self
            .hamiltonian
            .terms()
            .iter()
            .filter_map(|t| t.pauli.max_qubit())
            .find(|q| *q >= n_qubits)
        {
            return Err(SimError::QubitOutOfRange { qubit: q, n_qubits });
        }
        Ok(())
    }

    fn effective_n_qubits(&self) -> usize {
        self.n_qubits
            .unwrap_or_else(|| self.hamiltonian.min_qubits())
    }
}

/// `exp(-i c P dt)` for one term; identity strings contribute a global phase.
fn term_exponential(term: &HamiltonianTerm, dt: f64, n_qubits: usize) -> SimResult<Operator> {
    let angle = term.coeff * dt;
    if term.pauli.is_identity() {
        return Ok(Operator::identity(n_qubits).scale(Complex64::from_polar(1.0, -angle)));
    }
    term.pauli.exp_operator(angle, n_qubits)
}

fn repeat(slice: &Operator, n: usize, n_qubits: usize) -> SimResult<Operator> {
    (0..n).try_fold(Operator::identity(n_qubits), |acc, _| slice.compose(&acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates;
    use crate::hamiltonian::HamiltonianTerm;

    #[test]
    fn test_single_z_term_is_rz() {
        // exp(-i Z t) = Rz(2t)
        let h = Hamiltonian::from_terms(vec![HamiltonianTerm::z(0, 1.0)]);
        let u = TrotterEvolution::new(h, 0.4, 3).first_order().unwrap();
        assert!(u.approx_eq(&gates::rz(0.8), 1e-12));
    }

    #[test]
    fn test_transverse_field_is_rx_product() {
        // exp(-i β (X₀ + X₁)) = Rx(2β) ⊗ Rx(2β)
        let beta = 0.3;
        let u = TrotterEvolution::new(Hamiltonian::transverse_field(2), beta, 1)
            .first_order()
            .unwrap();
        let expected = gates::rx(2.0 * beta).kron(&gates::rx(2.0 * beta));
        assert!(u.approx_eq(&expected, 1e-12));
    }

    #[test]
    fn test_identity_term_is_global_phase() {
        let h = Hamiltonian::from_terms(vec![HamiltonianTerm::identity(2.0)]);
        let u = TrotterEvolution::new(h, 0.5, 1)
            .with_n_qubits(1)
            .first_order()
            .unwrap();
        let phase = Complex64::from_polar(1.0, -1.0);
        assert!((u.get(0, 0) - phase).norm() < 1e-12);
        assert!((u.get(1, 1) - phase).norm() < 1e-12);
    }

    #[test]
    fn test_second_order_more_accurate_than_first() {
        // Non-commuting H = X + Z; reference from many first-order steps.
        let h = Hamiltonian::from_terms(vec![
            HamiltonianTerm::x(0, 1.0),
            HamiltonianTerm::z(0, 1.0),
        ]);
        let reference = TrotterEvolution::new(h.clone(), 1.0, 2000)
            .first_order()
            .unwrap();
        let first = TrotterEvolution::new(h.clone(), 1.0, 4).first_order().unwrap();
        let second = TrotterEvolution::new(h, 1.0, 4).second_order().unwrap();

        let err = |u: &Operator| {
            u.matrix()
                .iter()
                .zip(reference.matrix().iter())
                .map(|(a, b)| (*a - *b).norm())
                .fold(0.0, f64::max)
        };
        assert!(err(&second) < err(&first));
    }
}
