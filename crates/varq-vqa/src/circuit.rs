//! Circuit assembly from parameterized blocks.
//!
//! A [`Circuit`] applies an optional prelude once, then repeats its block
//! sequence for `p` layers with independent parameters per layer.
//!
//! # Ordering
//!
//! Blocks are applied to the state in the order they were added, so the
//! first block of the first layer is the rightmost factor of the full
//! unitary:
//!
//! ```text
//! U(θ) = L_p · … · L_1 · P,    L_j = B_{j,m} · … · B_{j,1}
//! ```
//!
//! For the QAOA sequence `[cost(γ), mixer(β)]` after an `H^{⊗n}` prelude this
//! gives `U = Π_{j=p..1} exp(-iβ_j H_B) exp(-iγ_j H_P) · H^{⊗n}`.
//!
//! # Parameter layout
//!
//! Prelude parameters come first, then layer-major: layer 0's blocks in
//! order, then layer 1, and so on.

use std::ops::Range;

use rayon::prelude::*;
use tracing::debug;
use varq_sim::{MAX_QUBITS, Operator, SimError, Statevector};

use crate::block::{Block, DerivativePolicy};
use crate::error::{VqaError, VqaResult};

/// One scheduled block application with its parameter slice.
#[derive(Debug, Clone)]
pub struct Placement<'a> {
    /// The block being applied.
    pub block: &'a Block,
    /// Layer index, or `None` for prelude blocks.
    pub layer: Option<usize>,
    /// Range of the block's parameters in the circuit parameter vector.
    pub params: Range<usize>,
}

/// A layered sequence of blocks on a fixed-width register.
#[derive(Debug, Clone)]
pub struct Circuit {
    n_qubits: usize,
    prelude: Vec<Block>,
    blocks: Vec<Block>,
    layers: usize,
}

/// Builder for [`Circuit`].
#[derive(Debug, Clone)]
pub struct CircuitBuilder {
    n_qubits: usize,
    prelude: Vec<Block>,
    blocks: Vec<Block>,
    layers: usize,
}

impl CircuitBuilder {
    /// Append a block applied once before the layers.
    #[must_use]
    pub fn prelude(mut self, block: Block) -> Self {
        self.prelude.push(block);
        self
    }

    /// Append a block to the repeated layer.
    #[must_use]
    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Append several blocks to the repeated layer.
    #[must_use]
    pub fn blocks(mut self, blocks: impl IntoIterator<Item = Block>) -> Self {
        self.blocks.extend(blocks);
        self
    }

    /// Set the layer-repetition count `p`.
    #[must_use]
    pub fn layers(mut self, p: usize) -> Self {
        self.layers = p;
        self
    }

    /// Validate and build.
    pub fn build(self) -> VqaResult<Circuit> {
        if self.n_qubits == 0 {
            return Err(VqaError::InvalidConfig(
                "circuit needs at least one qubit".into(),
            ));
        }
        if self.n_qubits > MAX_QUBITS {
            return Err(SimError::TooManyQubits {
                requested: self.n_qubits,
                max: MAX_QUBITS,
            }
            .into());
        }
        if self.layers == 0 {
            return Err(VqaError::InvalidConfig(
                "layer count must be at least 1".into(),
            ));
        }
        if self.blocks.is_empty() {
            return Err(VqaError::InvalidConfig(
                "circuit needs at least one layer block".into(),
            ));
        }
        for block in self.prelude.iter().chain(&self.blocks) {
            if let Some(q) = block.qubits().iter().find(|q| **q >= self.n_qubits) {
                return Err(SimError::QubitOutOfRange {
                    qubit: *q,
                    n_qubits: self.n_qubits,
                }
                .into());
            }
        }

        let circuit = Circuit {
            n_qubits: self.n_qubits,
            prelude: self.prelude,
            blocks: self.blocks,
            layers: self.layers,
        };
        debug!(
            n_qubits = circuit.n_qubits,
            layers = circuit.layers,
            blocks = circuit.blocks.len(),
            prelude = circuit.prelude.len(),
            n_params = circuit.num_parameters(),
            "built circuit"
        );
        Ok(circuit)
    }
}

impl Circuit {
    /// Start building a circuit on `n_qubits` qubits with one layer.
    pub fn builder(n_qubits: usize) -> CircuitBuilder {
        CircuitBuilder {
            n_qubits,
            prelude: Vec::new(),
            blocks: Vec::new(),
            layers: 1,
        }
    }

    /// Register width.
    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    /// Layer-repetition count `p`.
    pub fn layers(&self) -> usize {
        self.layers
    }

    /// Blocks applied once before the layers.
    pub fn prelude(&self) -> &[Block] {
        &self.prelude
    }

    /// The repeated block sequence.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Parameters consumed by one layer.
    pub fn layer_arity(&self) -> usize {
        self.blocks.iter().map(Block::n_params).sum()
    }

    /// Parameters consumed by the prelude.
    pub fn prelude_arity(&self) -> usize {
        self.prelude.iter().map(Block::n_params).sum()
    }

    /// Prelude arity plus `p` × layer arity.
    pub fn num_parameters(&self) -> usize {
        self.prelude_arity() + self.layers * self.layer_arity()
    }

    /// Every block application in order, with its parameter range.
    pub fn placements(&self) -> Vec<Placement<'_>> {
        let prelude = self.prelude.iter().map(|b| (b, None));
        let layered = (0..self.layers)
            .flat_map(|layer| self.blocks.iter().map(move |b| (b, Some(layer))));
        let mut offset = 0;
        prelude
            .chain(layered)
            .map(|(block, layer)| {
                let start = offset;
                offset += block.n_params();
                Placement {
                    block,
                    layer,
                    params: start..offset,
                }
            })
            .collect()
    }

    /// Human-readable name for every parameter, in layout order.
    pub fn parameter_labels(&self) -> Vec<String> {
        self.placements()
            .iter()
            .flat_map(|p| {
                let prefix = match p.layer {
                    Some(layer) => format!("L{layer}.{}", p.block.name()),
                    None => format!("prelude.{}", p.block.name()),
                };
                let width = p.params.len();
                (0..width).map(move |k| {
                    if width == 1 {
                        prefix.clone()
                    } else {
                        format!("{prefix}[{k}]")
                    }
                })
            })
            .collect()
    }

    /// Blocks owning each parameter, in layout order.
    pub fn parameter_owners(&self) -> Vec<&Block> {
        self.placements()
            .into_iter()
            .flat_map(|p| std::iter::repeat_n(p.block, p.params.len()))
            .collect()
    }

    /// Fail with `ParameterCountMismatch` unless `params` fits the layout.
    pub fn check_parameters(&self, params: &[f64]) -> VqaResult<()> {
        let expected = self.num_parameters();
        if params.len() != expected {
            return Err(VqaError::ParameterCountMismatch {
                expected,
                got: params.len(),
            });
        }
        Ok(())
    }

    /// Fail with `UndifferentiableBlock` for the first block `policy` cannot
    /// differentiate.
    pub fn check_differentiable(&self, policy: DerivativePolicy) -> VqaResult<()> {
        self.prelude
            .iter()
            .chain(&self.blocks)
            .try_for_each(|b| b.check_differentiable(policy))
    }

    /// The full `2^n × 2^n` unitary.
    pub fn unitary(&self, params: &[f64]) -> VqaResult<Operator> {
        self.check_parameters(params)?;
        self.placements()
            .iter()
            .try_fold(Operator::identity(self.n_qubits), |acc, p| -> VqaResult<Operator> {
                let op = p.block.operator(&params[p.params.clone()])?;
                Ok(op.embed(p.block.qubits(), self.n_qubits)?.compose(&acc)?)
            })
    }

    /// Final state from `|0…0⟩`.
    pub fn simulate(&self, params: &[f64]) -> VqaResult<Statevector> {
        self.check_parameters(params)?;
        let mut state = Statevector::new(self.n_qubits)?;
        for p in self.placements() {
            let op = p.block.operator(&params[p.params.clone()])?;
            state.apply_operator(&op, p.block.qubits())?;
        }
        Ok(state)
    }

    /// `∂|ψ(θ)⟩/∂θ_i` for every parameter, computed in parallel.
    ///
    /// For parameter `k` of the block at step `s`:
    /// `∂ψ = U_{>s} · ∂B_s/∂θ_k · U_{<s} |0⟩`.
    pub fn state_derivatives(
        &self,
        params: &[f64],
        policy: DerivativePolicy,
    ) -> VqaResult<Vec<Statevector>> {
        self.check_parameters(params)?;
        let placements = self.placements();

        // Forward pass: the state entering each step and each step's operator.
        let mut operators = Vec::with_capacity(placements.len());
        let mut entering = Vec::with_capacity(placements.len());
        let mut state = Statevector::new(self.n_qubits)?;
        for p in &placements {
            let op = p.block.operator(&params[p.params.clone()])?;
            entering.push(state.clone());
            state.apply_operator(&op, p.block.qubits())?;
            operators.push(op);
        }

        let derivatives = placements
            .par_iter()
            .map(|p| p.block.derivatives(&params[p.params.clone()], policy))
            .collect::<VqaResult<Vec<_>>>()?;

        let jobs: Vec<(usize, usize)> = placements
            .iter()
            .enumerate()
            .flat_map(|(step, p)| (0..p.params.len()).map(move |k| (step, k)))
            .collect();

        jobs.par_iter()
            .map(|&(step, k)| -> VqaResult<Statevector> {
                let mut psi = entering[step].clone();
                psi.apply_operator(&derivatives[step][k], placements[step].block.qubits())?;
                for (op, later) in operators.iter().zip(&placements).skip(step + 1) {
                    psi.apply_operator(op, later.block.qubits())?;
                }
                Ok(psi)
            })
            .collect()
    }
}
