//! Property-based tests for block operators and circuit parameter layouts.
//!
//! Every generator kind must produce the same operator for the same
//! parameters, and reject parameter slices of the wrong length.

use proptest::prelude::*;
use varq_sim::{Hamiltonian, HamiltonianTerm, gates};
use varq_vqa::{Block, Circuit, ClosureGenerator, PauliRotation, VqaError};

/// Block kinds drawn for property testing.
#[derive(Debug, Clone, Copy)]
enum BlockKind {
    Rotation,
    PairRotation,
    CommutingEvolution,
    TrotterEvolution,
    Closure,
}

impl BlockKind {
    fn build(self) -> Block {
        match self {
            BlockKind::Rotation => Block::ry("ry", 0),
            BlockKind::PairRotation => Block::new("zz", vec![0, 1], PauliRotation::zz()).unwrap(),
            BlockKind::CommutingEvolution => {
                let h = Hamiltonian::from_terms(vec![
                    HamiltonianTerm::zz(0, 1, 0.8),
                    HamiltonianTerm::z(1, -0.3),
                ]);
                Block::evolution("cost", h, 2).unwrap()
            }
            BlockKind::TrotterEvolution => {
                let h = Hamiltonian::from_terms(vec![
                    HamiltonianTerm::x(0, 1.0),
                    HamiltonianTerm::zz(0, 1, 0.5),
                ]);
                Block::evolution("mix", h, 2).unwrap()
            }
            BlockKind::Closure => Block::new(
                "ryrz",
                vec![0],
                ClosureGenerator::new(1, 2, |p| {
                    gates::rz(p[1]).compose(&gates::ry(p[0])).unwrap()
                }),
            )
            .unwrap(),
        }
    }
}

fn arb_kind() -> impl Strategy<Value = BlockKind> {
    prop_oneof![
        Just(BlockKind::Rotation),
        Just(BlockKind::PairRotation),
        Just(BlockKind::CommutingEvolution),
        Just(BlockKind::TrotterEvolution),
        Just(BlockKind::Closure),
    ]
}

fn arb_params(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-std::f64::consts::PI..std::f64::consts::PI, len)
}

/// A block together with parameters of its declared arity.
fn arb_block_with_params() -> impl Strategy<Value = (BlockKind, Vec<f64>)> {
    arb_kind().prop_flat_map(|kind| {
        let arity = kind.build().n_params();
        (Just(kind), arb_params(arity))
    })
}

/// A block together with a parameter slice of any other length.
fn arb_block_with_wrong_params() -> impl Strategy<Value = (BlockKind, Vec<f64>)> {
    (arb_kind(), 0_usize..6)
        .prop_filter("length must differ from the arity", |(kind, len)| {
            kind.build().n_params() != *len
        })
        .prop_flat_map(|(kind, len)| (Just(kind), arb_params(len)))
}

/// A three-block layer (arity 4) repeated `layers` times.
fn layered_circuit(layers: usize) -> Circuit {
    Circuit::builder(2)
        .prelude(Block::h(0))
        .block(BlockKind::Rotation.build())
        .block(BlockKind::PairRotation.build())
        .block(
            Block::new(
                "ryrz",
                vec![1],
                ClosureGenerator::new(1, 2, |p| {
                    gates::rz(p[1]).compose(&gates::ry(p[0])).unwrap()
                }),
            )
            .unwrap(),
        )
        .layers(layers)
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn operator_is_deterministic((kind, params) in arb_block_with_params()) {
        let block = kind.build();
        let first = block.operator(&params).unwrap();
        let second = block.operator(&params).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert!(first.is_unitary(1e-9));

        // A freshly built block of the same kind agrees too.
        prop_assert_eq!(&kind.build().operator(&params).unwrap(), &first);
    }

    #[test]
    fn wrong_arity_is_rejected((kind, params) in arb_block_with_wrong_params()) {
        let block = kind.build();
        let is_arity_mismatch = matches!(
            block.operator(&params),
            Err(VqaError::ArityMismatch { expected, got, .. })
                if expected == block.n_params() && got == params.len()
        );
        prop_assert!(is_arity_mismatch);
    }

    #[test]
    fn circuit_needs_layers_times_arity(layers in 1_usize..=4, seed_params in arb_params(16)) {
        let circuit = layered_circuit(layers);
        prop_assert_eq!(circuit.layer_arity(), 4);
        prop_assert_eq!(circuit.num_parameters(), 4 * layers);

        let params = &seed_params[..4 * layers];
        let first = circuit.simulate(params).unwrap();
        let second = circuit.simulate(params).unwrap();
        prop_assert!(first.fidelity(&second).unwrap() > 1.0 - 1e-12);
    }

    #[test]
    fn circuit_rejects_other_lengths(layers in 1_usize..=4, len in 0_usize..=17) {
        prop_assume!(len != 4 * layers);
        let circuit = layered_circuit(layers);
        let params = vec![0.1; len];
        let is_count_mismatch = matches!(
            circuit.simulate(&params),
            Err(VqaError::ParameterCountMismatch { expected, got })
                if expected == 4 * layers && got == len
        );
        prop_assert!(is_count_mismatch);
    }
}
