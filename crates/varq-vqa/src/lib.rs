//! `varq-vqa`: variational quantum algorithms on top of `varq-sim`.
//!
//! The hybrid loop has four parts:
//!
//! - [`Block`]: a circuit segment that turns a parameter slice into a
//!   unitary on its qubits, with an optional derivative rule
//! - [`Circuit`]: blocks in order, an optional prelude, and `p` layer
//!   repetitions sharing the block structure but not the parameters
//! - [`CostEvaluator`]: scores a simulated circuit as a bitstring
//!   expectation, a function of the statevector, or `⟨ψ|H|ψ⟩`
//! - [`Optimizer`]: runs a classical [`Method`] against the cost until it
//!   converges, hits the iteration cap, is cancelled or times out
//!
//! # Quick start
//!
//! ```rust
//! use varq_sim::{Hamiltonian, HamiltonianTerm};
//! use varq_vqa::{Block, Circuit, CostEvaluator, CostSpec, Method, Optimizer, OptimizerConfig};
//!
//! let circuit = Circuit::builder(1).block(Block::ry("theta", 0)).build().unwrap();
//! let x = Hamiltonian::from_terms(vec![HamiltonianTerm::x(0, 1.0)]);
//! let cost = CostEvaluator::from_spec(CostSpec::observable(x)).unwrap();
//! let config = OptimizerConfig::default()
//!     .with_method(Method::gradient_descent(0.4))
//!     .with_max_iterations(300);
//!
//! let result = Optimizer::new(circuit, cost, config)
//!     .unwrap()
//!     .optimize_parameters()
//!     .unwrap();
//! assert!(result.best_cost() < -0.99);
//! ```

pub mod ansatz;
pub mod block;
pub mod circuit;
pub mod config;
pub mod cost;
pub mod error;
pub mod gradient;
pub mod methods;
pub mod optimizer;
pub mod problems;

pub use block::{
    Block, ClosureGenerator, DerivativePolicy, FixedGate, Generator, HamiltonianEvolution,
    PauliRotation,
};
pub use circuit::{Circuit, CircuitBuilder, Placement};
pub use config::{ConfigError, InitPolicy, OptimizerConfig};
pub use cost::{BitstringFn, CostEvaluator, CostMode, CostSpec, ShotPolicy, StateFn};
pub use error::{VqaError, VqaResult};
pub use gradient::{GradientConfig, GradientEstimator, GradientMethod};
pub use methods::{Method, Objective, Step, Stepper};
pub use optimizer::{CancelHandle, OptimizationResult, Optimizer, Termination};
pub use problems::{LabelMap, MaxCut, NumberPartition, Problem};
