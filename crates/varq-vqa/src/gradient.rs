//! Cost gradients.
//!
//! Three methods are available, chosen in configuration:
//!
//! - [`GradientMethod::Analytic`]: chain rule through block derivative
//!   operators. For an observable, `∂⟨H⟩/∂θ_i = 2 Re⟨Hψ|∂_iψ⟩`; for an exact
//!   bitstring cost, `Σ_x f(x) · 2 Re(ψ_x* ∂_iψ_x)`.
//! - [`GradientMethod::ParameterShift`]: `(f(θ+π/2) − f(θ−π/2)) / 2` per
//!   parameter, exact for Pauli-rotation parameters.
//! - [`GradientMethod::FiniteDifference`]: central differences of the cost.
//!
//! With `fallback_to_finite_difference`, analytic gradients differentiate
//! blocks lacking an analytic rule by finite differences of the block
//! operator, and parameter shift falls back to cost finite differences for
//! parameters that are not Pauli-rotation angles.
//!
//! Independent gradient components are evaluated in parallel.

use std::f64::consts::FRAC_PI_2;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use varq_sim::Bitstring;

use crate::block::DerivativePolicy;
use crate::circuit::Circuit;
use crate::cost::{CostEvaluator, CostSpec, ShotPolicy};
use crate::error::{VqaError, VqaResult};

/// Gradient computation method.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GradientMethod {
    /// Chain rule over block derivative operators.
    #[default]
    Analytic,
    /// Parameter-shift rule.
    ParameterShift,
    /// Central finite differences of the cost.
    FiniteDifference {
        /// Step `h`.
        step: f64,
    },
}

impl fmt::Display for GradientMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradientMethod::Analytic => f.write_str("analytic"),
            GradientMethod::ParameterShift => f.write_str("parameter-shift"),
            GradientMethod::FiniteDifference { step } => write!(f, "finite-difference(h={step})"),
        }
    }
}

/// Gradient settings carried by the optimizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientConfig {
    /// Primary method.
    #[serde(default)]
    pub method: GradientMethod,
    /// Fall back to finite differences where the primary method has no rule.
    #[serde(default = "default_fallback")]
    pub fallback_to_finite_difference: bool,
    /// Step used by the fallback.
    #[serde(default = "default_fallback_step")]
    pub fallback_step: f64,
}

fn default_fallback() -> bool {
    true
}

fn default_fallback_step() -> f64 {
    1e-5
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            method: GradientMethod::default(),
            fallback_to_finite_difference: default_fallback(),
            fallback_step: default_fallback_step(),
        }
    }
}

impl GradientConfig {
    /// The block derivative policy implied by the fallback setting.
    pub fn derivative_policy(&self) -> DerivativePolicy {
        if self.fallback_to_finite_difference {
            DerivativePolicy::AnalyticOrFiniteDifference {
                step: self.fallback_step,
            }
        } else {
            DerivativePolicy::Analytic
        }
    }
}

/// How one parameter is differentiated under parameter shift.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Component {
    Shift,
    Difference(f64),
}

/// Computes cost gradients for one circuit and evaluator.
///
/// Construction checks that the configured method can differentiate every
/// parameter, so [`GradientEstimator::gradient`] only fails on simulation
/// errors.
#[derive(Debug)]
pub struct GradientEstimator<'a> {
    circuit: &'a Circuit,
    cost: &'a CostEvaluator,
    config: GradientConfig,
    components: Vec<Component>,
}

impl<'a> GradientEstimator<'a> {
    /// Validate `config` against the circuit and cost.
    pub fn new(circuit: &'a Circuit, cost: &'a CostEvaluator, config: GradientConfig) -> VqaResult<Self> {
        let components = match config.method {
            GradientMethod::Analytic => {
                if !matches!(
                    cost.spec(),
                    CostSpec::Observable(_)
                        | CostSpec::Bitstring {
                            shots: ShotPolicy::Exact,
                            ..
                        }
                ) {
                    return Err(VqaError::GradientUnavailable {
                        method: config.method.to_string(),
                        reason: format!(
                            "{} cost is not an exact function of the amplitudes",
                            describe(cost.spec())
                        ),
                    });
                }
                circuit.check_differentiable(config.derivative_policy())?;
                Vec::new()
            }
            GradientMethod::ParameterShift => circuit
                .parameter_owners()
                .into_iter()
                .map(|block| {
                    if block.supports_parameter_shift() {
                        Ok(Component::Shift)
                    } else if config.fallback_to_finite_difference {
                        Ok(Component::Difference(config.fallback_step))
                    } else {
                        Err(VqaError::UndifferentiableBlock {
                            block: block.name().to_string(),
                        })
                    }
                })
                .collect::<VqaResult<Vec<_>>>()?,
            GradientMethod::FiniteDifference { step } => {
                vec![Component::Difference(step); circuit.num_parameters()]
            }
        };
        Ok(Self {
            circuit,
            cost,
            config,
            components,
        })
    }

    /// The method in use.
    pub fn method(&self) -> GradientMethod {
        self.config.method
    }

    /// Cost evaluations spent per gradient (one simulation for analytic).
    pub fn evaluations_per_gradient(&self) -> usize {
        match self.config.method {
            GradientMethod::Analytic => 1,
            _ => 2 * self.components.len(),
        }
    }

    /// `∇f(params)`.
    pub fn gradient(&self, params: &[f64]) -> VqaResult<Vec<f64>> {
        self.circuit.check_parameters(params)?;
        match self.config.method {
            GradientMethod::Analytic => self.analytic(params),
            _ => self.componentwise(params),
        }
    }

    fn analytic(&self, params: &[f64]) -> VqaResult<Vec<f64>> {
        let state = self.circuit.simulate(params)?;
        let derivatives = self
            .circuit
            .state_derivatives(params, self.config.derivative_policy())?;

        match self.cost.spec() {
            CostSpec::Observable(h) => {
                let h_psi = h.apply(&state)?;
                derivatives
                    .par_iter()
                    .map(|d| -> VqaResult<f64> { Ok(2.0 * h_psi.inner(d)?.re) })
                    .collect()
            }
            CostSpec::Bitstring { function, .. } => {
                let n = state.n_qubits();
                let weights: Vec<f64> = (0..state.amplitudes().len())
                    .map(|i| function(&Bitstring::new(i, n)))
                    .collect();
                Ok(derivatives
                    .par_iter()
                    .map(|d| {
                        state
                            .amplitudes()
                            .iter()
                            .zip(d.amplitudes())
                            .zip(&weights)
                            .map(|((a, da), w)| 2.0 * w * (a.conj() * *da).re)
                            .sum::<f64>()
                    })
                    .collect())
            }
            CostSpec::State(_) => Err(VqaError::GradientUnavailable {
                method: self.config.method.to_string(),
                reason: "state cost functions have no analytic gradient".into(),
            }),
        }
    }

    fn componentwise(&self, params: &[f64]) -> VqaResult<Vec<f64>> {
        self.components
            .par_iter()
            .enumerate()
            .map(|(i, component)| -> VqaResult<f64> {
                let (shift, scale) = match component {
                    Component::Shift => (FRAC_PI_2, 0.5),
                    Component::Difference(h) => (*h, 0.5 / h),
                };
                let mut plus = params.to_vec();
                let mut minus = params.to_vec();
                plus[i] += shift;
                minus[i] -= shift;
                let f_plus = self.cost.evaluate(self.circuit, &plus)?;
                let f_minus = self.cost.evaluate(self.circuit, &minus)?;
                Ok(scale * (f_plus - f_minus))
            })
            .collect()
    }
}

fn describe(spec: &CostSpec) -> &'static str {
    match spec {
        CostSpec::Bitstring { .. } => "sampled bitstring",
        CostSpec::State(_) => "state",
        CostSpec::Observable(_) => "observable",
    }
}
