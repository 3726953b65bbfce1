//! Hamiltonian data structures.
//!
//! A Hamiltonian is a sum of weighted Pauli strings:
//!
//!   H = Σ_k  c_k · P_k
//!
//! where each P_k is a tensor product of single-qubit Pauli operators
//! (I, X, Y, Z) and c_k ∈ ℝ.
//!
//! Pauli strings act on a statevector without materialising a matrix:
//! `P|x⟩ = φ(x) |x ⊕ f⟩` where `f` flips every X/Y qubit and `φ(x)` collects
//! the Y and Z phases.
//!
//! # Example
//!
//! ```rust
//! use varq_sim::hamiltonian::{Hamiltonian, HamiltonianTerm, PauliOp, PauliString};
//!
//! // H = -1.0·Z₀Z₁  +  0.5·X₀
//! let h = Hamiltonian::from_terms(vec![
//!     HamiltonianTerm::new(-1.0, PauliString::from_ops(vec![(0, PauliOp::Z), (1, PauliOp::Z)])),
//!     HamiltonianTerm::new( 0.5, PauliString::from_ops(vec![(0, PauliOp::X)])),
//! ]);
//! assert_eq!(h.n_terms(), 2);
//! ```

use std::fmt;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::operator::Operator;
use crate::statevector::Statevector;

/// Single-qubit Pauli operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PauliOp {
    /// Identity; contributes a global phase.
    I,
    /// Pauli-X.
    X,
    /// Pauli-Y.
    Y,
    /// Pauli-Z.
    Z,
}

impl PauliOp {
    /// Single-letter name.
    pub fn name(&self) -> &'static str {
        match self {
            PauliOp::I => "I",
            PauliOp::X => "X",
            PauliOp::Y => "Y",
            PauliOp::Z => "Z",
        }
    }
}

impl fmt::Display for PauliOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tensor product of Pauli operators on named qubits.
///
/// Stored as a sorted `Vec<(qubit_index, PauliOp)>` with Identity terms
/// omitted.  Qubits not listed are implicitly I.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PauliString {
    /// Non-identity terms, sorted by qubit index ascending.
    ops: Vec<(usize, PauliOp)>,
}

impl PauliString {
    /// Construct a PauliString from an iterator of (qubit, op) pairs.
    ///
    /// Identity operators are dropped; the remaining ops are sorted by qubit.
    pub fn from_ops(ops: impl IntoIterator<Item = (usize, PauliOp)>) -> Self {
        let mut v: Vec<(usize, PauliOp)> = ops
            .into_iter()
            .filter(|(_, op)| *op != PauliOp::I)
            .collect();
        v.sort_by_key(|(q, _)| *q);
        Self { ops: v }
    }

    /// Construct a Z⊗Z⊗...⊗Z string spanning the given qubits.
    pub fn zz(qubits: impl IntoIterator<Item = usize>) -> Self {
        Self::from_ops(qubits.into_iter().map(|q| (q, PauliOp::Z)))
    }

    /// Return the non-identity (qubit, op) pairs, sorted by qubit index.
    pub fn ops(&self) -> &[(usize, PauliOp)] {
        &self.ops
    }

    /// True if there are no non-identity operators (pure global phase).
    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// True if the string contains only Z operators.
    pub fn is_diagonal(&self) -> bool {
        self.ops.iter().all(|(_, op)| *op == PauliOp::Z)
    }

    /// The highest qubit index referenced, or `None` for an identity string.
    pub fn max_qubit(&self) -> Option<usize> {
        self.ops.last().map(|(q, _)| *q)
    }

    /// True if `self` and `other` commute: they anticommute on an even
    /// number of shared qubits.
    pub fn commutes_with(&self, other: &PauliString) -> bool {
        let clashes = self
            .ops
            .iter()
            .filter(|(q, op)| {
                other
                    .ops
                    .iter()
                    .any(|(q2, op2)| q == q2 && op != op2)
            })
            .count();
        clashes % 2 == 0
    }

    /// Qubits flipped by X and Y.
    fn flip_mask(&self) -> usize {
        self.ops
            .iter()
            .filter(|(_, op)| matches!(op, PauliOp::X | PauliOp::Y))
            .fold(0, |m, (q, _)| m | (1 << q))
    }

    /// Qubits contributing a sign (Y and Z), and the number of Y factors.
    fn sign_mask_and_y_count(&self) -> (usize, usize) {
        self.ops.iter().fold((0, 0), |(mask, ys), (q, op)| match op {
            PauliOp::Y => (mask | (1 << q), ys + 1),
            PauliOp::Z => (mask | (1 << q), ys),
            _ => (mask, ys),
        })
    }

    /// Phase function `φ(x)` with `P|x⟩ = φ(x)|x ⊕ f⟩`.
    fn phases(&self) -> impl Fn(usize) -> Complex64 + use<> {
        let (sign_mask, ys) = self.sign_mask_and_y_count();
        let y_phase = Complex64::new(0.0, 1.0).powu(ys as u32);
        move |x: usize| {
            if (x & sign_mask).count_ones() % 2 == 1 {
                -y_phase
            } else {
                y_phase
            }
        }
    }

    fn check_width(&self, n_qubits: usize) -> SimResult<()> {
        match self.max_qubit() {
            Some(q) if q >= n_qubits => Err(SimError::QubitOutOfRange { qubit: q, n_qubits }),
            _ => Ok(()),
        }
    }

    /// `P|ψ⟩`.
    pub fn apply(&self, state: &Statevector) -> SimResult<Statevector> {
        self.check_width(state.n_qubits())?;
        let flip = self.flip_mask();
        let phase = self.phases();
        let mut out = vec![Complex64::new(0.0, 0.0); state.amplitudes().len()];
        for (x, amp) in state.amplitudes().iter().enumerate() {
            out[x ^ flip] = phase(x) * *amp;
        }
        Statevector::from_amplitudes(out)
    }

    /// `⟨ψ|P|ψ⟩` (real because P is Hermitian).
    pub fn expectation(&self, state: &Statevector) -> SimResult<f64> {
        self.check_width(state.n_qubits())?;
        let flip = self.flip_mask();
        let phase = self.phases();
        let amps = state.amplitudes();
        let value: Complex64 = amps
            .iter()
            .enumerate()
            .map(|(x, amp)| amps[x ^ flip].conj() * phase(x) * *amp)
            .sum();
        Ok(value.re)
    }

    /// Dense matrix of this string on an `n_qubits` register.
    pub fn to_operator(&self, n_qubits: usize) -> SimResult<Operator> {
        self.check_width(n_qubits)?;
        let flip = self.flip_mask();
        let phase = self.phases();
        let mut op = Operator::zeros(n_qubits);
        let matrix = op.matrix_mut();
        for x in 0..(1usize << n_qubits) {
            matrix[[x ^ flip, x]] = phase(x);
        }
        Ok(op)
    }

    /// `exp(-i θ P) = cos θ · I − i sin θ · P` on an `n_qubits` register.
    pub fn exp_operator(&self, theta: f64, n_qubits: usize) -> SimResult<Operator> {
        let p = self.to_operator(n_qubits)?;
        Operator::identity(n_qubits)
            .scale(Complex64::new(theta.cos(), 0.0))
            .add(&p.scale(Complex64::new(0.0, -theta.sin())))
    }
}

impl fmt::Display for PauliString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return f.write_str("I");
        }
        for (i, (qubit, op)) in self.ops.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{op}[{qubit}]")?;
        }
        Ok(())
    }
}

/// A single weighted Pauli term: `coeff · pauli`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HamiltonianTerm {
    /// Real coefficient.
    pub coeff: f64,
    /// The Pauli string.
    pub pauli: PauliString,
}

impl HamiltonianTerm {
    /// Create a new term.
    pub fn new(coeff: f64, pauli: PauliString) -> Self {
        Self { coeff, pauli }
    }

    /// Shorthand: constant offset `coeff · I`.
    pub fn identity(coeff: f64) -> Self {
        Self::new(coeff, PauliString::from_ops(std::iter::empty()))
    }

    /// Shorthand: single-qubit Z term.
    pub fn z(qubit: usize, coeff: f64) -> Self {
        Self::new(coeff, PauliString::from_ops([(qubit, PauliOp::Z)]))
    }

    /// Shorthand: ZZ coupling term.
    pub fn zz(q0: usize, q1: usize, coeff: f64) -> Self {
        Self::new(
            coeff,
            PauliString::from_ops([(q0, PauliOp::Z), (q1, PauliOp::Z)]),
        )
    }

    /// Shorthand: single-qubit X term.
    pub fn x(qubit: usize, coeff: f64) -> Self {
        Self::new(coeff, PauliString::from_ops([(qubit, PauliOp::X)]))
    }

    /// Shorthand: single-qubit Y term.
    pub fn y(qubit: usize, coeff: f64) -> Self {
        Self::new(coeff, PauliString::from_ops([(qubit, PauliOp::Y)]))
    }
}

impl fmt::Display for HamiltonianTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+.4} {}", self.coeff, self.pauli)
    }
}

/// A sum-of-Pauli-strings Hamiltonian.
///
/// H = Σ_k  c_k · P_k
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hamiltonian {
    terms: Vec<HamiltonianTerm>,
}

impl Hamiltonian {
    /// Create from a list of terms.
    pub fn from_terms(terms: Vec<HamiltonianTerm>) -> Self {
        Self { terms }
    }

    /// The transverse mixer `Σ_q X_q` on `n_qubits` qubits.
    pub fn transverse_field(n_qubits: usize) -> Self {
        (0..n_qubits).map(|q| HamiltonianTerm::x(q, 1.0)).collect()
    }

    /// All terms.
    pub fn terms(&self) -> &[HamiltonianTerm] {
        &self.terms
    }

    /// Number of terms.
    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    /// Append a term.
    pub fn add_term(&mut self, term: HamiltonianTerm) {
        self.terms.push(term);
    }

    /// Spectral norm upper bound: Σ |c_k|.
    pub fn lambda(&self) -> f64 {
        self.terms.iter().map(|t| t.coeff.abs()).sum()
    }

    /// The minimum number of qubits required to represent this Hamiltonian.
    ///
    /// Returns 0 if the Hamiltonian is empty or purely identity.
    pub fn min_qubits(&self) -> usize {
        self.terms
            .iter()
            .filter_map(|t| t.pauli.max_qubit())
            .max()
            .map_or(0, |q| q + 1)
    }

    /// True if every term is a product of Z operators (diagonal in the
    /// computational basis).
    pub fn is_diagonal(&self) -> bool {
        self.terms.iter().all(|t| t.pauli.is_diagonal())
    }

    /// True if all terms pairwise commute, so `exp(-itH)` factorises exactly.
    pub fn all_commute(&self) -> bool {
        self.terms.iter().enumerate().all(|(i, a)| {
            self.terms[i + 1..]
                .iter()
                .all(|b| a.pauli.commutes_with(&b.pauli))
        })
    }

    /// `⟨ψ|H|ψ⟩`.
    pub fn expectation(&self, state: &Statevector) -> SimResult<f64> {
        self.terms.iter().try_fold(0.0, |acc, t| {
            Ok(acc + t.coeff * t.pauli.expectation(state)?)
        })
    }

    /// `H|ψ⟩`.
    pub fn apply(&self, state: &Statevector) -> SimResult<Statevector> {
        let mut out = vec![Complex64::new(0.0, 0.0); state.amplitudes().len()];
        for term in &self.terms {
            let applied = term.pauli.apply(state)?;
            for (o, a) in out.iter_mut().zip(applied.amplitudes()) {
                *o += term.coeff * *a;
            }
        }
        Statevector::from_amplitudes(out)
    }

    /// Energy of every computational basis state, for diagonal Hamiltonians.
    ///
    /// Returns `None` if any term contains X or Y.
    pub fn diagonal_energies(&self, n_qubits: usize) -> SimResult<Option<Vec<f64>>> {
        if !self.is_diagonal() {
            return Ok(None);
        }
        if let Some(q) = self.terms.iter().filter_map(|t| t.pauli.max_qubit()).max() {
            if q >= n_qubits {
                return Err(SimError::QubitOutOfRange { qubit: q, n_qubits });
            }
        }
        let energies = (0..1usize << n_qubits)
            .map(|x| {
                self.terms
                    .iter()
                    .map(|t| {
                        let mask = t.pauli.ops().iter().fold(0, |m, (q, _)| m | (1 << q));
                        if (x & mask).count_ones() % 2 == 1 {
                            -t.coeff
                        } else {
                            t.coeff
                        }
                    })
                    .sum::<f64>()
            })
            .collect::<Vec<f64>>();
        Ok(Some(energies))
    }

    /// Dense matrix of `H` on an `n_qubits` register.
    pub fn to_operator(&self, n_qubits: usize) -> SimResult<Operator> {
        self.terms.iter().try_fold(Operator::zeros(n_qubits), |acc, t| {
            acc.add(&t.pauli.to_operator(n_qubits)?.scale(Complex64::new(t.coeff, 0.0)))
        })
    }
}

impl FromIterator<HamiltonianTerm> for Hamiltonian {
    fn from_iter<T: IntoIterator<Item = HamiltonianTerm>>(iter: T) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Hamiltonian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Hamiltonian ({} terms, {} qubits):",
            self.n_terms(),
            self.min_qubits()
        )?;
        for term in &self.terms {
            writeln!(f, "  {term}")?;
        }
        Ok(())
    }
}
