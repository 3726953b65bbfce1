//! The hybrid loop: assemble, simulate, score, update.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};

use crate::circuit::Circuit;
use crate::config::{InitPolicy, OptimizerConfig};
use crate::cost::CostEvaluator;
use crate::error::{VqaError, VqaResult};
use crate::gradient::{GradientEstimator, GradientMethod};
use crate::methods::Objective;

/// Why an optimization run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The method's tolerance test passed.
    Converged,
    /// The iteration cap was reached first.
    NonConvergence,
    /// The cancel handle was triggered.
    Cancelled,
    /// The configured timeout elapsed.
    DeadlineExceeded,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Termination::Converged => "converged",
            Termination::NonConvergence => "non-convergence",
            Termination::Cancelled => "cancelled",
            Termination::DeadlineExceeded => "deadline exceeded",
        };
        f.write_str(s)
    }
}

/// Shared flag that stops a running optimization between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// A fresh, untriggered handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`CancelHandle::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of [`Optimizer::optimize_parameters`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    best_params: Vec<f64>,
    best_cost: f64,
    final_params: Vec<f64>,
    cost_history: Vec<f64>,
    termination: Termination,
    iterations: usize,
    cost_evaluations: usize,
    gradient_evaluations: usize,
    elapsed_seconds: f64,
}

impl OptimizationResult {
    /// Parameters with the lowest cost seen.
    pub fn best_params(&self) -> &[f64] {
        &self.best_params
    }

    /// The lowest cost seen.
    pub fn best_cost(&self) -> f64 {
        self.best_cost
    }

    /// Parameters scored by the last iteration.
    pub fn final_params(&self) -> &[f64] {
        &self.final_params
    }

    /// One cost per executed iteration.
    pub fn cost_history(&self) -> &[f64] {
        &self.cost_history
    }

    /// Why the run stopped.
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// True if the run converged.
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }

    /// Iterations executed.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Cost evaluations, including those spent inside gradient estimates.
    pub fn cost_evaluations(&self) -> usize {
        self.cost_evaluations
    }

    /// Gradient estimates.
    pub fn gradient_evaluations(&self) -> usize {
        self.gradient_evaluations
    }

    /// Wall-clock time of the run.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }
}

/// Drives a [`Circuit`] and [`CostEvaluator`] with an [`OptimizerConfig`].
#[derive(Debug)]
pub struct Optimizer {
    circuit: Circuit,
    cost: CostEvaluator,
    config: OptimizerConfig,
    cancel: CancelHandle,
}

impl Optimizer {
    /// Bind a problem to a configuration.
    ///
    /// Every check that does not need a simulation happens here: the config
    /// is validated, its declared shape and cost mode are compared with the
    /// circuit and evaluator, the gradient method is matched against the
    /// blocks and cost, and an explicit starting point is length-checked.
    /// The evaluator is reseeded with the config seed.
    pub fn new(circuit: Circuit, cost: CostEvaluator, config: OptimizerConfig) -> VqaResult<Self> {
        config.validate()?;

        if let Some(n) = config.n_qubits {
            if n != circuit.n_qubits() {
                return Err(VqaError::InvalidConfig(format!(
                    "config expects {n} qubits, circuit has {}",
                    circuit.n_qubits()
                )));
            }
        }
        if let Some(p) = config.layers {
            if p != circuit.layers() {
                return Err(VqaError::InvalidConfig(format!(
                    "config expects {p} layers, circuit has {}",
                    circuit.layers()
                )));
            }
        }
        if let Some(mode) = config.cost_mode {
            if mode != cost.mode() {
                return Err(VqaError::InvalidCostMode {
                    configured: mode,
                    supplied: cost.mode(),
                });
            }
        }
        if let Some(h) = cost.observable() {
            if h.min_qubits() > circuit.n_qubits() {
                return Err(VqaError::InvalidConfig(format!(
                    "observable acts on {} qubits, circuit has {}",
                    h.min_qubits(),
                    circuit.n_qubits()
                )));
            }
        }
        if config.method.uses_gradient() {
            GradientEstimator::new(&circuit, &cost, config.gradient)?;
        }
        if let InitPolicy::Explicit { values } = &config.initialization {
            if values.len() != circuit.num_parameters() {
                return Err(VqaError::ParameterCountMismatch {
                    expected: circuit.num_parameters(),
                    got: values.len(),
                });
            }
        }

        debug!(
            n_qubits = circuit.n_qubits(),
            layers = circuit.layers(),
            parameters = circuit.num_parameters(),
            method = %config.method,
            "optimizer ready"
        );
        let cost = cost.with_seed(config.seed);
        Ok(Self {
            circuit,
            cost,
            config,
            cancel: CancelHandle::new(),
        })
    }

    /// Share an existing cancel handle.
    #[must_use]
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that stops this optimizer between iterations.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The circuit being optimized.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// The cost evaluator.
    pub fn cost(&self) -> &CostEvaluator {
        &self.cost
    }

    /// The configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Run the loop until convergence, the iteration cap, cancellation or
    /// the deadline.
    ///
    /// Reaching the iteration cap is reported as
    /// [`Termination::NonConvergence`], not as an error.
    #[instrument(skip(self), fields(method = %self.config.method, parameters = self.circuit.num_parameters()))]
    pub fn optimize_parameters(&self) -> VqaResult<OptimizationResult> {
        let start = Instant::now();
        let deadline = self
            .config
            .timeout_seconds
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
            .and_then(|limit| start.checked_add(limit));
        let n_params = self.circuit.num_parameters();
        let initial = self
            .config
            .initialization
            .initial_parameters(n_params, self.config.seed);

        info!(
            max_iterations = self.config.max_iterations,
            tolerance = self.config.tolerance,
            "starting optimization"
        );

        let gradient = if self.config.method.uses_gradient() && n_params > 0 {
            Some(GradientEstimator::new(
                &self.circuit,
                &self.cost,
                self.config.gradient,
            )?)
        } else {
            None
        };
        let mut objective = LoopObjective {
            circuit: &self.circuit,
            cost: &self.cost,
            gradient,
            cost_evaluations: 0,
            gradient_evaluations: 0,
        };

        let mut history = Vec::new();
        let mut best_params = initial.clone();
        let mut best_cost = f64::INFINITY;
        let mut final_params = initial.clone();
        let mut termination = Termination::NonConvergence;

        if n_params == 0 {
            // Nothing to optimize: score the fixed circuit once.
            best_cost = objective.cost(&[])?;
            history.push(best_cost);
            termination = Termination::Converged;
        } else {
            let mut stepper =
                self.config
                    .method
                    .stepper(initial.clone(), self.config.tolerance, self.config.seed);

            for iteration in 0..self.config.max_iterations {
                if self.cancel.is_cancelled() {
                    warn!(iteration, "optimization cancelled");
                    termination = Termination::Cancelled;
                    break;
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    warn!(iteration, "optimization deadline exceeded");
                    termination = Termination::DeadlineExceeded;
                    break;
                }

                let step = stepper.step(&mut objective)?;
                trace!(iteration, cost = step.cost, "iteration");
                history.push(step.cost);
                if step.cost < best_cost {
                    best_cost = step.cost;
                    best_params.clone_from(&step.point);
                }
                final_params = step.point;

                if step.converged {
                    termination = Termination::Converged;
                    break;
                }
            }

            if history.is_empty() {
                best_cost = objective.cost(&initial)?;
            }
        }

        if termination == Termination::NonConvergence {
            warn!(
                iterations = history.len(),
                best_cost, "iteration cap reached without convergence"
            );
        }

        let result = OptimizationResult {
            best_params,
            best_cost,
            final_params,
            iterations: history.len(),
            cost_history: history,
            termination,
            cost_evaluations: objective.cost_evaluations,
            gradient_evaluations: objective.gradient_evaluations,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        };
        info!(
            termination = %result.termination,
            iterations = result.iterations,
            best_cost = result.best_cost,
            "optimization finished"
        );
        Ok(result)
    }
}

/// Counts evaluations while forwarding to the evaluator and gradient.
struct LoopObjective<'a> {
    circuit: &'a Circuit,
    cost: &'a CostEvaluator,
    gradient: Option<GradientEstimator<'a>>,
    cost_evaluations: usize,
    gradient_evaluations: usize,
}

impl Objective for LoopObjective<'_> {
    fn cost(&mut self, params: &[f64]) -> VqaResult<f64> {
        self.cost_evaluations += 1;
        self.cost.evaluate(self.circuit, params)
    }

    fn gradient(&mut self, params: &[f64]) -> VqaResult<Vec<f64>> {
        let estimator = self.gradient.as_ref().ok_or_else(|| VqaError::GradientUnavailable {
            method: "none".to_string(),
            reason: "the configured method does not use gradients".to_string(),
        })?;
        self.gradient_evaluations += 1;
        if estimator.method() != GradientMethod::Analytic {
            self.cost_evaluations += estimator.evaluations_per_gradient();
        }
        estimator.gradient(params)
    }
}
