//! Error types for the VQA crate.

use thiserror::Error;
use varq_sim::SimError;

use crate::config::ConfigError;
use crate::cost::CostMode;

/// Errors raised while defining or optimizing a variational problem.
///
/// Everything except [`VqaError::Sim`] is a configuration-time error and is
/// reported before any simulation work starts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VqaError {
    /// A block received a parameter vector of the wrong length.
    #[error("block '{block}' takes {expected} parameters, got {got}")]
    ArityMismatch {
        /// Block name.
        block: String,
        /// Declared arity.
        expected: usize,
        /// Supplied length.
        got: usize,
    },

    /// A circuit received a parameter vector of the wrong length.
    #[error("circuit takes {expected} parameters, got {got}")]
    ParameterCountMismatch {
        /// Prelude arity plus layers × per-layer arity.
        expected: usize,
        /// Supplied length.
        got: usize,
    },

    /// A cost function does not match the evaluator's configured mode.
    #[error("cost mode {configured} cannot run a {supplied} cost function")]
    InvalidCostMode {
        /// The mode the evaluator was configured for.
        configured: CostMode,
        /// The mode of the supplied function.
        supplied: CostMode,
    },

    /// A gradient was requested through a block with no derivative support.
    #[error("block '{block}' has no analytic derivative and finite-difference fallback is disabled")]
    UndifferentiableBlock {
        /// Block name.
        block: String,
    },

    /// The gradient method cannot be used with the configured cost.
    #[error("{method} gradient unavailable: {reason}")]
    GradientUnavailable {
        /// Gradient method name.
        method: String,
        /// Why it cannot be used.
        reason: String,
    },

    /// Circuit or optimizer settings are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Loading or validating an `OptimizerConfig` failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The simulator rejected an operation.
    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Result type for VQA operations.
pub type VqaResult<T> = Result<T, VqaError>;
