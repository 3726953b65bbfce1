//! Loop control, fail-fast construction and hand-computable costs.

use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_relative_eq;
use varq_sim::{Hamiltonian, HamiltonianTerm, PauliOp, gates};
use varq_vqa::{
    Block, CancelHandle, Circuit, CostEvaluator, CostMode, CostSpec, GradientConfig,
    GradientMethod, HamiltonianEvolution, InitPolicy, Method, Optimizer, OptimizerConfig,
    Termination, VqaError,
};

fn ry_circuit() -> Circuit {
    Circuit::builder(1).block(Block::ry("theta", 0)).build().unwrap()
}

fn observable(term: HamiltonianTerm) -> CostEvaluator {
    CostEvaluator::from_spec(CostSpec::observable(Hamiltonian::from_terms(vec![term]))).unwrap()
}

// ============================================================================
// Hand-computed costs
// ============================================================================

#[test]
fn test_ry_z_expectation_is_cosine() {
    let circuit = ry_circuit();
    let cost = observable(HamiltonianTerm::z(0, 1.0));
    for theta in [0.0, 0.4, FRAC_PI_2, 2.0, PI] {
        assert_relative_eq!(
            cost.evaluate(&circuit, &[theta]).unwrap(),
            theta.cos(),
            epsilon = 1e-12
        );
    }
}

#[test]
fn test_ry_x_minimized_at_minus_half_pi() {
    let circuit = ry_circuit();
    let cost = observable(HamiltonianTerm::x(0, 1.0));
    assert_relative_eq!(cost.evaluate(&circuit, &[0.3]).unwrap(), 0.3f64.sin(), epsilon = 1e-12);

    let config = OptimizerConfig::default()
        .with_method(Method::nelder_mead())
        .with_initialization(InitPolicy::Zeros)
        .with_tolerance(1e-12)
        .with_max_iterations(400);
    let result = Optimizer::new(circuit, cost, config)
        .unwrap()
        .optimize_parameters()
        .unwrap();
    assert_relative_eq!(result.best_cost(), -1.0, epsilon = 1e-8);
    assert_relative_eq!(result.best_params()[0], -FRAC_PI_2, epsilon = 1e-3);
}

// ============================================================================
// Parameter counts
// ============================================================================

#[test]
fn test_block_arity_mismatch() {
    let block = Block::ry("theta", 0);
    let err = block.operator(&[0.1, 0.2]).unwrap_err();
    assert!(matches!(
        err,
        VqaError::ArityMismatch { expected: 1, got: 2, .. }
    ));
}

#[test]
fn test_layers_times_arity() {
    let circuit = Circuit::builder(2)
        .block(Block::rx("a", 0))
        .block(Block::fixed("cz", vec![0, 1], gates::cz()).unwrap())
        .block(Block::new("zz", vec![0, 1], varq_vqa::PauliRotation::zz()).unwrap())
        .layers(3)
        .build()
        .unwrap();
    assert_eq!(circuit.num_parameters(), 6);
    assert!(circuit.simulate(&[0.0; 6]).is_ok());
    assert!(matches!(
        circuit.simulate(&[0.0; 5]),
        Err(VqaError::ParameterCountMismatch { expected: 6, got: 5 })
    ));
}

// ============================================================================
// Loop control
// ============================================================================

#[test]
fn test_cancellation_from_cost_function() {
    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let spec = CostSpec::state(move |psi| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            trigger.cancel();
        }
        psi.probabilities()[1]
    });
    let cost = CostEvaluator::from_spec(spec).unwrap();
    let config = OptimizerConfig::default().with_method(Method::nelder_mead());

    let optimizer = Optimizer::new(ry_circuit(), cost, config)
        .unwrap()
        .with_cancel_handle(cancel);
    let result = optimizer.optimize_parameters().unwrap();

    assert_eq!(result.termination(), Termination::Cancelled);
    assert_eq!(result.iterations(), 1);
    assert_eq!(result.cost_history().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_deadline_exceeded() {
    let config = OptimizerConfig::default()
        .with_method(Method::nelder_mead())
        .with_timeout(1e-9);
    let result = Optimizer::new(ry_circuit(), observable(HamiltonianTerm::z(0, 1.0)), config)
        .unwrap()
        .optimize_parameters()
        .unwrap();
    assert_eq!(result.termination(), Termination::DeadlineExceeded);
    assert!(result.best_cost().is_finite());
}

#[test]
fn test_unrepresentable_timeout_means_no_deadline() {
    let config = OptimizerConfig::default()
        .with_method(Method::gradient_descent(0.4))
        .with_max_iterations(10)
        .with_timeout(1e20);
    assert!(config.validate().is_ok());
    let result = Optimizer::new(ry_circuit(), observable(HamiltonianTerm::x(0, 1.0)), config)
        .unwrap()
        .optimize_parameters()
        .unwrap();
    assert_ne!(result.termination(), Termination::DeadlineExceeded);
    assert!(result.iterations() >= 1);
}

#[test]
fn test_non_convergence_keeps_history() {
    let config = OptimizerConfig::default()
        .with_method(Method::gradient_descent(1e-3))
        .with_tolerance(0.0)
        .with_max_iterations(12);
    let result = Optimizer::new(ry_circuit(), observable(HamiltonianTerm::x(0, 1.0)), config)
        .unwrap()
        .optimize_parameters()
        .unwrap();
    assert_eq!(result.termination(), Termination::NonConvergence);
    assert_eq!(result.iterations(), 12);
    assert_eq!(result.cost_history().len(), 12);
    assert_eq!(result.best_params().len(), 1);
    assert!(result.best_cost() <= result.cost_history()[0]);

    let json = serde_json::to_string(&result).unwrap();
    let back: varq_vqa::OptimizationResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back.termination(), Termination::NonConvergence);
    assert_eq!(back.iterations(), 12);
    assert_relative_eq!(back.best_cost(), result.best_cost(), epsilon = 1e-12);
}

// ============================================================================
// Fail-fast construction
// ============================================================================

#[test]
fn test_cost_mode_mismatch() {
    let config = OptimizerConfig::default().with_cost_mode(CostMode::State);
    let err = Optimizer::new(ry_circuit(), observable(HamiltonianTerm::z(0, 1.0)), config)
        .unwrap_err();
    assert!(matches!(
        err,
        VqaError::InvalidCostMode {
            configured: CostMode::State,
            supplied: CostMode::Observable,
        }
    ));
}

#[test]
fn test_layer_mismatch() {
    let config = OptimizerConfig::default().with_shape(1, 4);
    let err = Optimizer::new(ry_circuit(), observable(HamiltonianTerm::z(0, 1.0)), config)
        .unwrap_err();
    assert!(matches!(err, VqaError::InvalidConfig(_)));
}

#[test]
fn test_observable_wider_than_circuit() {
    let cost = observable(HamiltonianTerm::zz(0, 3, 1.0));
    let err = Optimizer::new(ry_circuit(), cost, OptimizerConfig::default()).unwrap_err();
    assert!(matches!(err, VqaError::InvalidConfig(_)));
}

#[test]
fn test_undifferentiable_block_without_fallback() {
    let h = Hamiltonian::from_terms(vec![HamiltonianTerm::x(0, 1.0), HamiltonianTerm::z(0, 1.0)]);
    let circuit = Circuit::builder(1)
        .block(Block::new("mix", vec![0], HamiltonianEvolution::new(h, 1).unwrap()).unwrap())
        .build()
        .unwrap();
    let strict = GradientConfig {
        method: GradientMethod::Analytic,
        fallback_to_finite_difference: false,
        ..GradientConfig::default()
    };
    let config = OptimizerConfig::default().with_gradient(strict);
    let err = Optimizer::new(circuit.clone(), observable(HamiltonianTerm::z(0, 1.0)), config)
        .unwrap_err();
    assert!(matches!(err, VqaError::UndifferentiableBlock { .. }));

    // With the fallback the same circuit optimizes.
    let config = OptimizerConfig::default().with_max_iterations(5);
    let result = Optimizer::new(circuit, observable(HamiltonianTerm::z(0, 1.0)), config)
        .unwrap()
        .optimize_parameters()
        .unwrap();
    assert!((1..=5).contains(&result.iterations()));
    assert!(result.gradient_evaluations() >= 1);
}

#[test]
fn test_parameter_shift_on_multi_qubit_rotation() {
    let circuit = Circuit::builder(2)
        .prelude(Block::h(0))
        .prelude(Block::h(1))
        .block(
            Block::new(
                "xy",
                vec![0, 1],
                varq_vqa::PauliRotation::new(&[PauliOp::X, PauliOp::Y]).unwrap(),
            )
            .unwrap(),
        )
        .build()
        .unwrap();
    let cost = observable(HamiltonianTerm::zz(0, 1, 1.0));
    let config = OptimizerConfig::default()
        .with_gradient(GradientConfig {
            method: GradientMethod::ParameterShift,
            fallback_to_finite_difference: false,
            ..GradientConfig::default()
        })
        .with_max_iterations(3);
    let result = Optimizer::new(circuit, cost, config)
        .unwrap()
        .optimize_parameters()
        .unwrap();
    assert!(result.iterations() <= 3);
    // Each parameter-shift gradient costs two evaluations per parameter.
    assert_eq!(
        result.cost_evaluations(),
        result.iterations() + 2 * result.gradient_evaluations()
    );
}
