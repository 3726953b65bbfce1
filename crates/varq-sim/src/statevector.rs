//! Statevector simulation engine.

use num_complex::Complex64;
use rand::Rng;
use tracing::trace;

use crate::counts::{Bitstring, Counts};
use crate::error::{SimError, SimResult};
use crate::operator::{Operator, local_offsets, qubit_mask, validate_targets};

/// Widest register the dense simulator accepts.
pub const MAX_QUBITS: usize = 20;

/// A statevector representing a quantum state.
///
/// Vectors produced by differentiation are not normalized; every method
/// below works on arbitrary vectors unless stated otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    /// Number of qubits.
    n_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(n_qubits: usize) -> SimResult<Self> {
        let mut sv = Self::zeros(n_qubits)?;
        sv.amplitudes[0] = Complex64::new(1.0, 0.0);
        Ok(sv)
    }

    /// The all-zero vector (not a valid state; used as an accumulator).
    pub fn zeros(n_qubits: usize) -> SimResult<Self> {
        if n_qubits > MAX_QUBITS {
            return Err(SimError::TooManyQubits {
                requested: n_qubits,
                max: MAX_QUBITS,
            });
        }
        Ok(Self {
            amplitudes: vec![Complex64::new(0.0, 0.0); 1 << n_qubits],
            n_qubits,
        })
    }

    /// Wrap explicit amplitudes; the length must be a power of two.
    pub fn from_amplitudes(amplitudes: Vec<Complex64>) -> SimResult<Self> {
        let len = amplitudes.len();
        if len == 0 || !len.is_power_of_two() {
            return Err(SimError::DimensionMismatch {
                expected: len.next_power_of_two().max(1),
                got: len,
            });
        }
        let n_qubits = len.trailing_zeros() as usize;
        if n_qubits > MAX_QUBITS {
            return Err(SimError::TooManyQubits {
                requested: n_qubits,
                max: MAX_QUBITS,
            });
        }
        Ok(Self {
            amplitudes,
            n_qubits,
        })
    }

    /// Get the number of qubits.
    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    /// Borrow the amplitudes.
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Amplitude of basis state `index`.
    pub fn amplitude(&self, index: usize) -> Complex64 {
        self.amplitudes[index]
    }

    /// Apply `op` to the listed qubits (local bit `j` ↔ `qubits[j]`).
    pub fn apply_operator(&mut self, op: &Operator, qubits: &[usize]) -> SimResult<()> {
        validate_targets(qubits, op.n_qubits(), self.n_qubits)?;

        if let Some(diagonal) = op.diagonal() {
            self.apply_diagonal(&diagonal, qubits);
        } else if qubits.len() == 1 {
            self.apply_single(op, qubits[0]);
        } else {
            self.apply_dense(op, qubits);
        }
        Ok(())
    }

    /// Apply an operator spanning the whole register in natural qubit order.
    pub fn apply_full(&mut self, op: &Operator) -> SimResult<()> {
        let qubits: Vec<usize> = (0..self.n_qubits).collect();
        self.apply_operator(op, &qubits)
    }

    fn apply_diagonal(&mut self, diagonal: &[Complex64], qubits: &[usize]) {
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            let local = qubits
                .iter()
                .enumerate()
                .fold(0, |acc, (j, q)| acc | (((i >> q) & 1) << j));
            *amp *= diagonal[local];
        }
    }

    fn apply_single(&mut self, op: &Operator, qubit: usize) {
        let mask = 1 << qubit;
        let (m00, m01, m10, m11) = (op.get(0, 0), op.get(0, 1), op.get(1, 0), op.get(1, 1));
        for i in 0..(1 << self.n_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = m00 * a + m01 * b;
                self.amplitudes[j] = m10 * a + m11 * b;
            }
        }
    }

    fn apply_dense(&mut self, op: &Operator, qubits: &[usize]) {
        let mask = qubit_mask(qubits);
        let offsets = local_offsets(qubits);
        let local_dim = offsets.len();
        let mut local = vec![Complex64::new(0.0, 0.0); local_dim];

        trace!(k = qubits.len(), "dense operator application");
        for base in 0..(1 << self.n_qubits) {
            if base & mask != 0 {
                continue;
            }
            for (l, offset) in offsets.iter().enumerate() {
                local[l] = self.amplitudes[base | offset];
            }
            for (r, offset) in offsets.iter().enumerate() {
                let mut acc = Complex64::new(0.0, 0.0);
                for (c, value) in local.iter().enumerate() {
                    acc += op.get(r, c) * *value;
                }
                self.amplitudes[base | offset] = acc;
            }
        }
    }

    /// `Σ |a_i|²`.
    pub fn norm_sqr(&self) -> f64 {
        self.amplitudes.iter().map(|a| a.norm_sqr()).sum()
    }

    /// Outcome probabilities `|a_i|²`, indexed by basis state.
    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(|a| a.norm_sqr()).collect()
    }

    /// Inner product `⟨self|other⟩`.
    pub fn inner(&self, other: &Statevector) -> SimResult<Complex64> {
        if self.amplitudes.len() != other.amplitudes.len() {
            return Err(SimError::DimensionMismatch {
                expected: self.amplitudes.len(),
                got: other.amplitudes.len(),
            });
        }
        Ok(self
            .amplitudes
            .iter()
            .zip(&other.amplitudes)
            .map(|(a, b)| a.conj() * *b)
            .sum())
    }

    /// `|⟨self|other⟩|²`.
    pub fn fidelity(&self, other: &Statevector) -> SimResult<f64> {
        Ok(self.inner(other)?.norm_sqr())
    }

    /// The most likely outcome and its probability.
    pub fn most_probable(&self) -> (Bitstring, f64) {
        let (index, p) = self
            .amplitudes
            .iter()
            .map(|a| a.norm_sqr())
            .enumerate()
            .fold((0, f64::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });
        (Bitstring::new(index, self.n_qubits), p)
    }

    /// Sample a measurement outcome.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Bitstring {
        let r: f64 = rng.r#gen::<f64>() * self.norm_sqr();

        let mut cumulative = 0.0;
        for (i, amp) in self.amplitudes.iter().enumerate() {
            cumulative += amp.norm_sqr();
            if r < cumulative {
                return Bitstring::new(i, self.n_qubits);
            }
        }

        // Rounding can leave r just above the final cumulative sum.
        Bitstring::new(self.amplitudes.len() - 1, self.n_qubits)
    }

    /// Sample `shots` outcomes without collapsing the state.
    pub fn sample_counts<R: Rng>(&self, shots: u32, rng: &mut R) -> SimResult<Counts> {
        if shots == 0 {
            return Err(SimError::InvalidShots(0));
        }
        let cumulative: Vec<f64> = self
            .amplitudes
            .iter()
            .scan(0.0, |acc, a| {
                *acc += a.norm_sqr();
                Some(*acc)
            })
            .collect();
        let total = cumulative.last().copied().unwrap_or(0.0);
        let last = self.amplitudes.len() - 1;

        let mut counts = Counts::new();
        for _ in 0..shots {
            let r = rng.r#gen::<f64>() * total;
            let index = cumulative.partition_point(|c| *c <= r).min(last);
            counts.insert(Bitstring::new(index, self.n_qubits), 1);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn approx_eq(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-10
    }

    #[test]
    fn test_initial_state() {
        let sv = Statevector::new(2).unwrap();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(1.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[2], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(0.0, 0.0)));
    }

    #[test]
    fn test_too_many_qubits() {
        assert!(matches!(
            Statevector::new(MAX_QUBITS + 1),
            Err(SimError::TooManyQubits { .. })
        ));
    }

    #[test]
    fn test_hadamard() {
        let mut sv = Statevector::new(1).unwrap();
        sv.apply_operator(&gates::h(), &[0]).unwrap();

        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(sqrt2_inv, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(sqrt2_inv, 0.0)));
    }

    #[test]
    fn test_bell_state() {
        let mut sv = Statevector::new(2).unwrap();
        sv.apply_operator(&gates::h(), &[0]).unwrap();
        sv.apply_operator(&gates::cx(), &[0, 1]).unwrap();

        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(sqrt2_inv, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[2], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(sqrt2_inv, 0.0)));
    }

    #[test]
    fn test_reversed_cx_targets() {
        // Control on qubit 1: X on qubit 1 first, then CX(1→0) flips qubit 0.
        let mut sv = Statevector::new(2).unwrap();
        sv.apply_operator(&gates::x(), &[1]).unwrap();
        sv.apply_operator(&gates::cx(), &[1, 0]).unwrap();
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(1.0, 0.0)));
    }

    #[test]
    fn test_dense_matches_embedded_operator() {
        let mut a = Statevector::new(3).unwrap();
        a.apply_operator(&gates::h(), &[0]).unwrap();
        a.apply_operator(&gates::ry(0.4), &[2]).unwrap();
        let mut b = a.clone();

        a.apply_operator(&gates::swap(), &[2, 0]).unwrap();
        let full = gates::swap().embed(&[2, 0], 3).unwrap();
        b.apply_full(&full).unwrap();

        for (x, y) in a.amplitudes().iter().zip(b.amplitudes()) {
            assert!(approx_eq(*x, *y));
        }
    }

    #[test]
    fn test_sample_deterministic() {
        // |1⟩ state should always sample to 1
        let mut sv = Statevector::new(1).unwrap();
        sv.apply_operator(&gates::x(), &[0]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            assert_eq!(sv.sample(&mut rng).value(), 1);
        }
    }

    #[test]
    fn test_sample_counts_total_and_seed() {
        let mut sv = Statevector::new(2).unwrap();
        sv.apply_operator(&gates::h(), &[0]).unwrap();
        sv.apply_operator(&gates::h(), &[1]).unwrap();

        let a = sv.sample_counts(500, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = sv.sample_counts(500, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a.total_shots(), 500);
        assert_eq!(a, b);
        assert!(matches!(
            sv.sample_counts(0, &mut StdRng::seed_from_u64(1)),
            Err(SimError::InvalidShots(0))
        ));
    }
}
