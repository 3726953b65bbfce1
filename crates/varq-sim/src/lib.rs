//! `varq-sim`: dense statevector simulation substrate.
//!
//! Provides the primitives the variational layer builds on:
//!
//! - [`Operator`]: dense `2^k × 2^k` complex matrices over a qubit subset
//! - [`gates`]: standard gate matrices (H, X, Rx, CX, RZZ, …)
//! - [`Statevector`]: `|ψ⟩` with operator application, probabilities and
//!   seeded shot sampling into [`Counts`]
//! - [`Hamiltonian`]: sums of weighted Pauli strings with expectation values
//!   and time evolution `exp(-i t H)` (exact or Trotterized)
//!
//! Qubit `q` corresponds to bit `q` of a basis-state index (little-endian).
//! For an operator on qubits `[q0, q1, …]`, local index bit `j` maps to
//! qubit `qj`.
//!
//! # Quick start
//!
//! ```rust
//! use varq_sim::{gates, Hamiltonian, HamiltonianTerm, Statevector};
//!
//! let mut psi = Statevector::new(2).unwrap();
//! psi.apply_operator(&gates::h(), &[0]).unwrap();
//! psi.apply_operator(&gates::cx(), &[0, 1]).unwrap();
//!
//! let zz = Hamiltonian::from_terms(vec![HamiltonianTerm::zz(0, 1, 1.0)]);
//! assert!((zz.expectation(&psi).unwrap() - 1.0).abs() < 1e-12);
//! ```

pub mod counts;
pub mod error;
pub mod gates;
pub mod hamiltonian;
pub mod operator;
pub mod statevector;
pub mod trotter;

pub use counts::{Bitstring, Counts};
pub use error::{SimError, SimResult};
pub use hamiltonian::{Hamiltonian, HamiltonianTerm, PauliOp, PauliString};
pub use operator::Operator;
pub use statevector::{MAX_QUBITS, Statevector};
pub use trotter::TrotterEvolution;

/// Complex amplitude type used throughout the workspace.
pub use num_complex::Complex64;
