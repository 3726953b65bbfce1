//! Parameterized circuit blocks.
//!
//! A [`Block`] is one named circuit segment: a qubit subset plus a
//! [`Generator`] that turns a parameter vector into a unitary on that subset.
//! Blocks own their generator by composition; the generator never needs to
//! know where in a register it is placed.
//!
//! Derivatives come from the generator when it has an analytic rule and
//! otherwise from a central finite difference of the block operator, as
//! selected by [`DerivativePolicy`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;
use varq_sim::hamiltonian::{Hamiltonian, PauliOp, PauliString};
use varq_sim::{Complex64, Operator, SimError, TrotterEvolution, gates};

use crate::error::{VqaError, VqaResult};

/// Trotter slices used for non-commuting evolution blocks unless overridden.
pub const DEFAULT_TROTTER_STEPS: usize = 8;

/// Produces a block's operator from its parameters.
///
/// Implementations must be deterministic: identical parameters yield
/// identical operators. Parameter vectors reaching a generator have already
/// been checked against [`Generator::n_params`].
pub trait Generator: fmt::Debug + Send + Sync {
    /// Width of the produced operator.
    fn n_qubits(&self) -> usize;

    /// Number of free parameters consumed.
    fn n_params(&self) -> usize;

    /// The operator `U(θ)` on the generator's local qubits.
    fn operator(&self, params: &[f64]) -> VqaResult<Operator>;

    /// `∂U/∂θ_k` for every parameter, or `None` without an analytic rule.
    fn analytic_derivatives(&self, _params: &[f64]) -> Option<VqaResult<Vec<Operator>>> {
        None
    }

    /// Whether [`Generator::analytic_derivatives`] returns `Some`.
    fn has_analytic_derivative(&self) -> bool {
        false
    }

    /// True for `exp(-i θ/2 P)` generators, which admit the parameter-shift rule.
    fn is_pauli_rotation(&self) -> bool {
        false
    }

    /// Short kind label for logs and reports.
    fn kind(&self) -> &'static str;
}

/// How [`Block::derivatives`] obtains derivative operators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivativePolicy {
    /// Analytic rules only; blocks without one are an error.
    Analytic,
    /// Analytic when available, otherwise `(U(θ+h e_k) − U(θ−h e_k)) / 2h`.
    AnalyticOrFiniteDifference {
        /// Step `h`.
        step: f64,
    },
}

// ---------------------------------------------------------------------------
// Built-in generators
// ---------------------------------------------------------------------------

/// A constant gate with no parameters (H, CX, a user matrix, …).
#[derive(Debug, Clone)]
pub struct FixedGate {
    operator: Operator,
}

impl FixedGate {
    /// Wrap a constant operator.
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }
}

impl Generator for FixedGate {
    fn n_qubits(&self) -> usize {
        self.operator.n_qubits()
    }

    fn n_params(&self) -> usize {
        0
    }

    fn operator(&self, _params: &[f64]) -> VqaResult<Operator> {
        Ok(self.operator.clone())
    }

    fn analytic_derivatives(&self, _params: &[f64]) -> Option<VqaResult<Vec<Operator>>> {
        Some(Ok(Vec::new()))
    }

    fn has_analytic_derivative(&self) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "fixed"
    }
}

/// Pauli rotation `R_P(θ) = exp(-i θ/2 P)`.
///
/// `dR/dθ = -i/2 · P · R_P(θ)`.
#[derive(Debug, Clone)]
pub struct PauliRotation {
    pauli: PauliString,
    n_qubits: usize,
    generator: Operator,
}

impl PauliRotation {
    /// Rotation about a Pauli string; `ops[j]` acts on local qubit `j`.
    pub fn new(ops: &[PauliOp]) -> VqaResult<Self> {
        if ops.is_empty() {
            return Err(VqaError::InvalidConfig(
                "a Pauli rotation needs at least one qubit".into(),
            ));
        }
        let n_qubits = ops.len();
        let pauli = PauliString::from_ops(ops.iter().copied().enumerate());
        let generator = pauli.to_operator(n_qubits)?;
        Ok(Self {
            pauli,
            n_qubits,
            generator,
        })
    }

    fn single(op: PauliOp) -> Self {
        Self {
            pauli: PauliString::from_ops([(0, op)]),
            n_qubits: 1,
            generator: gates::pauli(op),
        }
    }

    /// Rx.
    pub fn x() -> Self {
        Self::single(PauliOp::X)
    }

    /// Ry.
    pub fn y() -> Self {
        Self::single(PauliOp::Y)
    }

    /// Rz.
    pub fn z() -> Self {
        Self::single(PauliOp::Z)
    }

    /// RZZ on two local qubits.
    pub fn zz() -> Self {
        Self {
            pauli: PauliString::zz([0, 1]),
            n_qubits: 2,
            generator: gates::z().kron(&gates::z()),
        }
    }

    /// The rotation axis.
    pub fn pauli(&self) -> &PauliString {
        &self.pauli
    }
}

impl Generator for PauliRotation {
    fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    fn n_params(&self) -> usize {
        1
    }

    fn operator(&self, params: &[f64]) -> VqaResult<Operator> {
        Ok(self.pauli.exp_operator(params[0] / 2.0, self.n_qubits)?)
    }

    fn analytic_derivatives(&self, params: &[f64]) -> Option<VqaResult<Vec<Operator>>> {
        Some(self.operator(params).and_then(|rotation| {
            let d = self
                .generator
                .compose(&rotation)?
                .scale(Complex64::new(0.0, -0.5));
            Ok(vec![d])
        }))
    }

    fn has_analytic_derivative(&self) -> bool {
        true
    }

    fn is_pauli_rotation(&self) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "pauli_rotation"
    }
}

/// Hamiltonian evolution `exp(-i θ s H)` for a Pauli sum `H` and scale `s`.
///
/// When every pair of terms commutes the product of term exponentials is
/// exact and `dU/dθ = -i s H U`. Otherwise the operator is a first-order
/// Trotter product and has no analytic derivative.
#[derive(Debug, Clone)]
pub struct HamiltonianEvolution {
    hamiltonian: Hamiltonian,
    n_qubits: usize,
    scale: f64,
    trotter_steps: usize,
    commuting: bool,
    matrix: Operator,
}

impl HamiltonianEvolution {
    /// Evolution under `hamiltonian` on an `n_qubits` local register.
    pub fn new(hamiltonian: Hamiltonian, n_qubits: usize) -> VqaResult<Self> {
        if hamiltonian.n_terms() == 0 {
            return Err(SimError::EmptyHamiltonian.into());
        }
        if n_qubits == 0 {
            return Err(VqaError::InvalidConfig(
                "an evolution block needs at least one qubit".into(),
            ));
        }
        let matrix = hamiltonian.to_operator(n_qubits)?;
        let commuting = hamiltonian.all_commute();
        Ok(Self {
            hamiltonian,
            n_qubits,
            scale: 1.0,
            trotter_steps: DEFAULT_TROTTER_STEPS,
            commuting,
            matrix,
        })
    }

    /// Multiply the evolution time by `scale`.
    #[must_use]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Trotter slices for the non-commuting case.
    #[must_use]
    pub fn with_trotter_steps(mut self, steps: usize) -> Self {
        self.trotter_steps = steps;
        self
    }

    /// The generating Hamiltonian.
    pub fn hamiltonian(&self) -> &Hamiltonian {
        &self.hamiltonian
    }

    /// Time scale `s`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// True if the operator is exact (all terms commute).
    pub fn is_exact(&self) -> bool {
        self.commuting
    }
}

impl Generator for HamiltonianEvolution {
    fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    fn n_params(&self) -> usize {
        1
    }

    fn operator(&self, params: &[f64]) -> VqaResult<Operator> {
        let steps = if self.commuting { 1 } else { self.trotter_steps };
        let evolution =
            TrotterEvolution::new(self.hamiltonian.clone(), params[0] * self.scale, steps)
                .with_n_qubits(self.n_qubits);
        Ok(evolution.first_order()?)
    }

    fn analytic_derivatives(&self, params: &[f64]) -> Option<VqaResult<Vec<Operator>>> {
        if !self.commuting {
            return None;
        }
        Some(self.operator(params).and_then(|u| {
            let d = self
                .matrix
                .compose(&u)?
                .scale(Complex64::new(0.0, -self.scale));
            Ok(vec![d])
        }))
    }

    fn has_analytic_derivative(&self) -> bool {
        self.commuting
    }

    fn kind(&self) -> &'static str {
        "hamiltonian_evolution"
    }
}

type OperatorFn = dyn Fn(&[f64]) -> Operator + Send + Sync;
type DerivativeFn = dyn Fn(&[f64]) -> Vec<Operator> + Send + Sync;

/// A user-supplied operator function with an optional derivative function.
#[derive(Clone)]
pub struct ClosureGenerator {
    n_qubits: usize,
    n_params: usize,
    operator: Arc<OperatorFn>,
    derivative: Option<Arc<DerivativeFn>>,
}

impl ClosureGenerator {
    /// Wrap `operator`, which must return a `2^n_qubits` square operator.
    pub fn new<F>(n_qubits: usize, n_params: usize, operator: F) -> Self
    where
        F: Fn(&[f64]) -> Operator + Send + Sync + 'static,
    {
        Self {
            n_qubits,
            n_params,
            operator: Arc::new(operator),
            derivative: None,
        }
    }

    /// Attach an analytic derivative returning one operator per parameter.
    #[must_use]
    pub fn with_derivative<D>(mut self, derivative: D) -> Self
    where
        D: Fn(&[f64]) -> Vec<Operator> + Send + Sync + 'static,
    {
        self.derivative = Some(Arc::new(derivative));
        self
    }

    fn check_width(&self, op: &Operator) -> VqaResult<()> {
        if op.n_qubits() != self.n_qubits {
            return Err(SimError::DimensionMismatch {
                expected: 1 << self.n_qubits,
                got: op.dim(),
            }
            .into());
        }
        Ok(())
    }
}

impl fmt::Debug for ClosureGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureGenerator")
            .field("n_qubits", &self.n_qubits)
            .field("n_params", &self.n_params)
            .field("has_derivative", &self.derivative.is_some())
            .finish_non_exhaustive()
    }
}

impl Generator for ClosureGenerator {
    fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    fn n_params(&self) -> usize {
        self.n_params
    }

    fn operator(&self, params: &[f64]) -> VqaResult<Operator> {
        let op = (self.operator)(params);
        self.check_width(&op)?;
        Ok(op)
    }

    fn analytic_derivatives(&self, params: &[f64]) -> Option<VqaResult<Vec<Operator>>> {
        let derivative = self.derivative.as_ref()?;
        let ops = derivative(params);
        if ops.len() != self.n_params {
            return Some(Err(VqaError::InvalidConfig(format!(
                "derivative function returned {} operators for {} parameters",
                ops.len(),
                self.n_params
            ))));
        }
        Some(
            ops.iter()
                .try_for_each(|op| self.check_width(op))
                .map(|()| ops),
        )
    }

    fn has_analytic_derivative(&self) -> bool {
        self.derivative.is_some()
    }

    fn kind(&self) -> &'static str {
        "closure"
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A named circuit segment: a generator placed on a qubit subset.
///
/// Local qubit `j` of the generator is register qubit `qubits[j]`.
#[derive(Debug, Clone)]
pub struct Block {
    name: String,
    qubits: Vec<usize>,
    generator: Arc<dyn Generator>,
}

impl Block {
    /// Place `generator` on `qubits`.
    pub fn new(
        name: impl Into<String>,
        qubits: Vec<usize>,
        generator: impl Generator + 'static,
    ) -> VqaResult<Self> {
        Self::from_shared(name, qubits, Arc::new(generator))
    }

    /// Place an already shared generator on `qubits`.
    pub fn from_shared(
        name: impl Into<String>,
        qubits: Vec<usize>,
        generator: Arc<dyn Generator>,
    ) -> VqaResult<Self> {
        let name = name.into();
        for (i, q) in qubits.iter().enumerate() {
            if qubits[..i].contains(q) {
                return Err(SimError::DuplicateQubit(*q).into());
            }
        }
        if generator.n_qubits() != qubits.len() {
            return Err(VqaError::InvalidConfig(format!(
                "block '{name}' lists {} qubits but its generator acts on {}",
                qubits.len(),
                generator.n_qubits()
            )));
        }
        trace!(
            block = %name,
            kind = generator.kind(),
            n_params = generator.n_params(),
            "created block"
        );
        Ok(Self {
            name,
            qubits,
            generator,
        })
    }

    fn single_qubit(name: impl Into<String>, qubit: usize, generator: impl Generator + 'static) -> Self {
        Self {
            name: name.into(),
            qubits: vec![qubit],
            generator: Arc::new(generator),
        }
    }

    /// A constant gate.
    pub fn fixed(name: impl Into<String>, qubits: Vec<usize>, operator: Operator) -> VqaResult<Self> {
        Self::new(name, qubits, FixedGate::new(operator))
    }

    /// Hadamard on one qubit.
    pub fn h(qubit: usize) -> Self {
        Self::single_qubit(format!("h{qubit}"), qubit, FixedGate::new(gates::h()))
    }

    /// `Rx(θ)` on one qubit.
    pub fn rx(name: impl Into<String>, qubit: usize) -> Self {
        Self::single_qubit(name, qubit, PauliRotation::x())
    }

    /// `Ry(θ)` on one qubit.
    pub fn ry(name: impl Into<String>, qubit: usize) -> Self {
        Self::single_qubit(name, qubit, PauliRotation::y())
    }

    /// `Rz(θ)` on one qubit.
    pub fn rz(name: impl Into<String>, qubit: usize) -> Self {
        Self::single_qubit(name, qubit, PauliRotation::z())
    }

    /// `exp(-i θ H)` on register qubits `0..n_qubits`, with `H` indexed the
    /// same way.
    pub fn evolution(
        name: impl Into<String>,
        hamiltonian: Hamiltonian,
        n_qubits: usize,
    ) -> VqaResult<Self> {
        Self::new(
            name,
            (0..n_qubits).collect(),
            HamiltonianEvolution::new(hamiltonian, n_qubits)?,
        )
    }

    /// Block name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register qubits the block acts on.
    pub fn qubits(&self) -> &[usize] {
        &self.qubits
    }

    /// Number of free parameters.
    pub fn n_params(&self) -> usize {
        self.generator.n_params()
    }

    /// The underlying generator.
    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// True if the generator has an analytic derivative rule.
    pub fn has_analytic_derivative(&self) -> bool {
        self.generator.has_analytic_derivative()
    }

    /// True only for Pauli rotations.
    pub fn supports_parameter_shift(&self) -> bool {
        self.generator.is_pauli_rotation()
    }

    /// Fail with `ArityMismatch` unless `params` has the declared length.
    pub fn check_arity(&self, params: &[f64]) -> VqaResult<()> {
        if params.len() != self.n_params() {
            return Err(VqaError::ArityMismatch {
                block: self.name.clone(),
                expected: self.n_params(),
                got: params.len(),
            });
        }
        Ok(())
    }

    /// Fail with `UndifferentiableBlock` if `policy` cannot differentiate
    /// this block.
    pub fn check_differentiable(&self, policy: DerivativePolicy) -> VqaResult<()> {
        match policy {
            DerivativePolicy::Analytic if self.n_params() > 0 && !self.has_analytic_derivative() => {
                Err(VqaError::UndifferentiableBlock {
                    block: self.name.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// `U(θ)` on the block's qubits.
    pub fn operator(&self, params: &[f64]) -> VqaResult<Operator> {
        self.check_arity(params)?;
        self.generator.operator(params)
    }

    /// One derivative operator per parameter.
    pub fn derivatives(&self, params: &[f64], policy: DerivativePolicy) -> VqaResult<Vec<Operator>> {
        self.check_arity(params)?;
        if let Some(analytic) = self.generator.analytic_derivatives(params) {
            return analytic;
        }
        match policy {
            DerivativePolicy::Analytic => Err(VqaError::UndifferentiableBlock {
                block: self.name.clone(),
            }),
            DerivativePolicy::AnalyticOrFiniteDifference { step } => {
                self.finite_difference(params, step)
            }
        }
    }

    fn finite_difference(&self, params: &[f64], step: f64) -> VqaResult<Vec<Operator>> {
        let inv = Complex64::new(1.0 / (2.0 * step), 0.0);
        (0..params.len())
            .map(|k| {
                let mut plus = params.to_vec();
                let mut minus = params.to_vec();
                plus[k] += step;
                minus[k] -= step;
                let diff = self
                    .generator
                    .operator(&plus)?
                    .sub(&self.generator.operator(&minus)?)?;
                Ok(diff.scale(inv))
            })
            .collect()
    }
}
