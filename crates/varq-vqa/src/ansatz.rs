//! Ready-made block sequences.

use tracing::debug;
use varq_sim::{Hamiltonian, gates};

use crate::block::Block;
use crate::circuit::Circuit;
use crate::error::{VqaError, VqaResult};

/// QAOA circuit for `cost` with `layers` repetitions.
///
/// The register width is the smallest that holds every term of `cost`.
/// See [`qaoa_with_width`].
pub fn qaoa(cost: &Hamiltonian, layers: usize) -> VqaResult<Circuit> {
    qaoa_with_width(cost, cost.min_qubits(), layers)
}

/// QAOA circuit on `n_qubits` qubits.
///
/// The prelude prepares `|+⟩^n`; each layer applies `exp(-iγ H_P)` then
/// `exp(-iβ Σ X_q)`, so the parameter vector is `[γ_1, β_1, …, γ_p, β_p]`.
pub fn qaoa_with_width(cost: &Hamiltonian, n_qubits: usize, layers: usize) -> VqaResult<Circuit> {
    if n_qubits == 0 {
        return Err(VqaError::InvalidConfig(
            "cost Hamiltonian acts on no qubits".into(),
        ));
    }
    if cost.min_qubits() > n_qubits {
        return Err(VqaError::InvalidConfig(format!(
            "cost Hamiltonian needs {} qubits, register has {n_qubits}",
            cost.min_qubits()
        )));
    }

    let circuit = (0..n_qubits)
        .fold(Circuit::builder(n_qubits), |b, q| b.prelude(Block::h(q)))
        .block(Block::evolution("gamma", cost.clone(), n_qubits)?)
        .block(Block::evolution(
            "beta",
            Hamiltonian::transverse_field(n_qubits),
            n_qubits,
        )?)
        .layers(layers)
        .build()?;
    debug!(n_qubits, layers, terms = cost.n_terms(), "built QAOA circuit");
    Ok(circuit)
}

/// Hardware-efficient circuit: per layer, `Ry` on every qubit followed by a
/// CZ ladder `(0,1), (1,2), …`.
pub fn hardware_efficient(n_qubits: usize, layers: usize) -> VqaResult<Circuit> {
    let mut builder = Circuit::builder(n_qubits)
        .blocks((0..n_qubits).map(|q| Block::ry(format!("ry{q}"), q)));
    for q in 1..n_qubits {
        builder = builder.block(Block::fixed(format!("cz{}", q - 1), vec![q - 1, q], gates::cz())?);
    }
    let circuit = builder.layers(layers).build()?;
    debug!(n_qubits, layers, "built hardware-efficient circuit");
    Ok(circuit)
}
