//! Cost evaluation over simulated circuits.
//!
//! A [`CostEvaluator`] is fixed to one [`CostMode`] for the lifetime of a
//! problem. The matching [`CostSpec`] variant carries exactly what that mode
//! needs:
//!
//! | Mode         | Input                    | Cost                            |
//! |--------------|--------------------------|---------------------------------|
//! | `Bitstring`  | `Fn(&Bitstring) -> f64`  | mean over exact `p(x)` or shots |
//! | `State`      | `Fn(&Statevector) -> f64`| value on the final state        |
//! | `Observable` | `Hamiltonian`            | `⟨ψ|H|ψ⟩`                       |

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use tracing::trace;
use varq_sim::{Bitstring, Hamiltonian, SimError, Statevector};

use crate::circuit::Circuit;
use crate::error::{VqaError, VqaResult};

/// Shots sampled by one worker before results are combined.
const SHOT_CHUNK: u32 = 1024;

/// Cost evaluation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostMode {
    /// Score measured bitstrings.
    Bitstring,
    /// Score the final statevector directly.
    State,
    /// Expectation value of a fixed observable.
    Observable,
}

impl fmt::Display for CostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CostMode::Bitstring => "bitstring",
            CostMode::State => "state",
            CostMode::Observable => "observable",
        })
    }
}

/// How bitstrings are obtained in [`CostMode::Bitstring`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShotPolicy {
    /// Exact expectation over the outcome distribution.
    #[default]
    Exact,
    /// Mean over `shots` sampled outcomes.
    Sampled {
        /// Number of shots per evaluation.
        shots: u32,
    },
}

/// Scores one measured bitstring.
pub type BitstringFn = Arc<dyn Fn(&Bitstring) -> f64 + Send + Sync>;

/// Scores a final statevector.
pub type StateFn = Arc<dyn Fn(&Statevector) -> f64 + Send + Sync>;

/// A cost definition for one of the three modes.
#[derive(Clone)]
pub enum CostSpec {
    /// Bitstring scoring with a shot policy.
    Bitstring {
        /// Per-outcome cost.
        function: BitstringFn,
        /// Exact or sampled aggregation.
        shots: ShotPolicy,
    },
    /// Statevector scoring.
    State(StateFn),
    /// Observable expectation.
    Observable(Hamiltonian),
}

impl CostSpec {
    /// Bitstring cost from a plain function.
    pub fn bitstring<F>(function: F, shots: ShotPolicy) -> Self
    where
        F: Fn(&Bitstring) -> f64 + Send + Sync + 'static,
    {
        CostSpec::Bitstring {
            function: Arc::new(function),
            shots,
        }
    }

    /// Statevector cost from a plain function.
    pub fn state<F>(function: F) -> Self
    where
        F: Fn(&Statevector) -> f64 + Send + Sync + 'static,
    {
        CostSpec::State(Arc::new(function))
    }

    /// Observable cost.
    pub fn observable(hamiltonian: Hamiltonian) -> Self {
        CostSpec::Observable(hamiltonian)
    }

    /// The mode this spec belongs to.
    pub fn mode(&self) -> CostMode {
        match self {
            CostSpec::Bitstring { .. } => CostMode::Bitstring,
            CostSpec::State(_) => CostMode::State,
            CostSpec::Observable(_) => CostMode::Observable,
        }
    }
}

impl fmt::Debug for CostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostSpec::Bitstring { shots, .. } => f
                .debug_struct("Bitstring")
                .field("shots", shots)
                .finish_non_exhaustive(),
            CostSpec::State(_) => f.debug_tuple("State").finish_non_exhaustive(),
            CostSpec::Observable(h) => f.debug_tuple("Observable").field(h).finish(),
        }
    }
}

/// Scores simulated circuits under a fixed cost mode.
#[derive(Debug, Clone)]
pub struct CostEvaluator {
    mode: CostMode,
    spec: CostSpec,
    seed: u64,
}

impl CostEvaluator {
    /// Bind `spec` to `mode`; fails with `InvalidCostMode` if they differ.
    pub fn new(mode: CostMode, spec: CostSpec) -> VqaResult<Self> {
        if spec.mode() != mode {
            return Err(VqaError::InvalidCostMode {
                configured: mode,
                supplied: spec.mode(),
            });
        }
        if let CostSpec::Bitstring {
            shots: ShotPolicy::Sampled { shots: 0 },
            ..
        } = spec
        {
            return Err(SimError::InvalidShots(0).into());
        }
        Ok(Self {
            mode,
            spec,
            seed: 0,
        })
    }

    /// Evaluator whose mode is taken from `spec`.
    pub fn from_spec(spec: CostSpec) -> VqaResult<Self> {
        Self::new(spec.mode(), spec)
    }

    /// Seed for shot sampling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Configured mode.
    pub fn mode(&self) -> CostMode {
        self.mode
    }

    /// The cost definition.
    pub fn spec(&self) -> &CostSpec {
        &self.spec
    }

    /// Sampling seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The observable, in observable mode.
    pub fn observable(&self) -> Option<&Hamiltonian> {
        match &self.spec {
            CostSpec::Observable(h) => Some(h),
            _ => None,
        }
    }

    /// True if the cost is an exact function of the state amplitudes, so
    /// analytic gradients apply.
    pub fn is_exact(&self) -> bool {
        !matches!(
            self.spec,
            CostSpec::Bitstring {
                shots: ShotPolicy::Sampled { .. },
                ..
            }
        )
    }

    /// Simulate `circuit` at `params` and score the outcome.
    pub fn evaluate(&self, circuit: &Circuit, params: &[f64]) -> VqaResult<f64> {
        let state = circuit.simulate(params)?;
        let cost = self.score(&state, params)?;
        trace!(mode = %self.mode, cost, "evaluated cost");
        Ok(cost)
    }

    /// Score an already simulated state.
    ///
    /// Sampled shots are seeded from the evaluator seed and `params`, so
    /// repeated evaluations at the same point agree.
    pub fn score(&self, state: &Statevector, params: &[f64]) -> VqaResult<f64> {
        match &self.spec {
            CostSpec::Observable(h) => Ok(h.expectation(state)?),
            CostSpec::State(f) => Ok(f(state)),
            CostSpec::Bitstring {
                function,
                shots: ShotPolicy::Exact,
            } => Ok(exact_bitstring_cost(state, function.as_ref())),
            CostSpec::Bitstring {
                function,
                shots: ShotPolicy::Sampled { shots },
            } => sampled_bitstring_cost(
                state,
                function.as_ref(),
                *shots,
                self.sample_seed(params),
            ),
        }
    }

    /// Outcome probabilities of the final state, most likely first.
    pub fn distribution(&self, circuit: &Circuit, params: &[f64]) -> VqaResult<Vec<(Bitstring, f64)>> {
        let state = circuit.simulate(params)?;
        let n = state.n_qubits();
        let mut outcomes: Vec<(Bitstring, f64)> = state
            .probabilities()
            .into_iter()
            .enumerate()
            .map(|(i, p)| (Bitstring::new(i, n), p))
            .collect();
        outcomes.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(outcomes)
    }

    fn sample_seed(&self, params: &[f64]) -> u64 {
        let mut hasher = FxHasher::default();
        self.seed.hash(&mut hasher);
        for p in params {
            p.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

fn exact_bitstring_cost(state: &Statevector, function: &(dyn Fn(&Bitstring) -> f64 + Send + Sync)) -> f64 {
    let n = state.n_qubits();
    state
        .amplitudes()
        .iter()
        .enumerate()
        .filter(|(_, a)| a.norm_sqr() > 0.0)
        .map(|(i, a)| a.norm_sqr() * function(&Bitstring::new(i, n)))
        .sum()
}

fn sampled_bitstring_cost(
    state: &Statevector,
    function: &(dyn Fn(&Bitstring) -> f64 + Send + Sync),
    shots: u32,
    seed: u64,
) -> VqaResult<f64> {
    let chunks = shots.div_ceil(SHOT_CHUNK);
    let totals = (0..chunks)
        .into_par_iter()
        .map(|chunk| -> VqaResult<f64> {
            let size = SHOT_CHUNK.min(shots - chunk * SHOT_CHUNK);
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(u64::from(chunk)));
            let counts = state.sample_counts(size, &mut rng)?;
            Ok(counts
                .iter()
                .map(|(b, c)| *c as f64 * function(b))
                .sum())
        })
        .collect::<VqaResult<Vec<f64>>>()?;
    Ok(totals.iter().sum::<f64>() / f64::from(shots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use approx::assert_relative_eq;
    use varq_sim::HamiltonianTerm;

    fn ry_circuit() -> Circuit {
        Circuit::builder(1).block(Block::ry("ry", 0)).build().unwrap()
    }

    fn ones(b: &Bitstring) -> f64 {
        f64::from(b.count_ones())
    }

    #[test]
    fn test_mode_mismatch_is_rejected() {
        let err = CostEvaluator::new(CostMode::State, CostSpec::bitstring(ones, ShotPolicy::Exact))
            .unwrap_err();
        assert!(matches!(
            err,
            VqaError::InvalidCostMode {
                configured: CostMode::State,
                supplied: CostMode::Bitstring
            }
        ));
    }

    #[test]
    fn test_zero_shots_rejected() {
        let spec = CostSpec::bitstring(ones, ShotPolicy::Sampled { shots: 0 });
        assert!(matches!(
            CostEvaluator::from_spec(spec),
            Err(VqaError::Sim(SimError::InvalidShots(0)))
        ));
    }

    #[test]
    fn test_observable_is_cosine() {
        let h = Hamiltonian::from_terms(vec![HamiltonianTerm::z(0, 1.0)]);
        let eval = CostEvaluator::from_spec(CostSpec::observable(h)).unwrap();
        for theta in [0.0, 0.4, 1.3, 2.9] {
            assert_relative_eq!(
                eval.evaluate(&ry_circuit(), &[theta]).unwrap(),
                theta.cos(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_exact_bitstring_is_probability_weighted() {
        // P(1) = sin²(θ/2)
        let eval = CostEvaluator::from_spec(CostSpec::bitstring(ones, ShotPolicy::Exact)).unwrap();
        let theta: f64 = 1.1;
        assert_relative_eq!(
            eval.evaluate(&ry_circuit(), &[theta]).unwrap(),
            (theta / 2.0).sin().powi(2),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_state_function_sees_final_state() {
        let eval = CostEvaluator::from_spec(CostSpec::state(|s: &Statevector| s.amplitude(0).re))
            .unwrap();
        let theta: f64 = 0.6;
        assert_relative_eq!(
            eval.evaluate(&ry_circuit(), &[theta]).unwrap(),
            (theta / 2.0).cos(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_sampled_cost_is_deterministic_and_close() {
        let spec = CostSpec::bitstring(ones, ShotPolicy::Sampled { shots: 20_000 });
        let eval = CostEvaluator::from_spec(spec).unwrap().with_seed(11);
        let a = eval.evaluate(&ry_circuit(), &[1.1]).unwrap();
        let b = eval.evaluate(&ry_circuit(), &[1.1]).unwrap();
        assert_eq!(a, b);
        assert!((a - (0.55f64).sin().powi(2)).abs() < 0.02);
        assert!(!eval.is_exact());
    }

    #[test]
    fn test_distribution_sorted() {
        let eval = CostEvaluator::from_spec(CostSpec::bitstring(ones, ShotPolicy::Exact)).unwrap();
        let dist = eval.distribution(&ry_circuit(), &[2.5]).unwrap();
        assert_eq!(dist[0].0, Bitstring::new(1, 1));
        assert!(dist[0].1 > dist[1].1);
        assert_relative_eq!(dist.iter().map(|(_, p)| p).sum::<f64>(), 1.0, epsilon = 1e-12);
    }
}
