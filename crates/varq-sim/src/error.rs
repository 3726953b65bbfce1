//! Error types for the sim crate.

use thiserror::Error;

/// Errors produced by operator construction and statevector simulation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimError {
    /// A matrix or vector has a size that is not `2^n` (or not square).
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        got: usize,
    },

    /// A qubit index falls outside the register.
    #[error("qubit {qubit} is out of range for a {n_qubits}-qubit register")]
    QubitOutOfRange {
        /// The offending qubit index.
        qubit: usize,
        /// Register width.
        n_qubits: usize,
    },

    /// The same qubit was listed twice for one operator.
    #[error("qubit {0} listed more than once")]
    DuplicateQubit(usize),

    /// Hamiltonian contains no terms.
    #[error("Hamiltonian is empty, nothing to evolve")]
    EmptyHamiltonian,

    /// n_steps must be ≥ 1.
    #[error("n_steps must be at least 1, got {0}")]
    InvalidSteps(usize),

    /// Shot count must be ≥ 1.
    #[error("shots must be at least 1, got {0}")]
    InvalidShots(u32),

    /// Register too wide for dense simulation.
    #[error("{requested} qubits exceeds the dense simulation limit of {max}")]
    TooManyQubits {
        /// Requested register width.
        requested: usize,
        /// Supported maximum.
        max: usize,
    },
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
