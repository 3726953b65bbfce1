//! Problem definitions shared by the `run`, `partition` and `maxcut` commands.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use varq_sim::Bitstring;
use varq_vqa::{
    Circuit, CostEvaluator, CostSpec, MaxCut, NumberPartition, OptimizerConfig, Problem,
    ShotPolicy, ansatz,
};

/// Circuit family used to attack a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnsatzKind {
    /// Alternating cost and mixer evolutions from `|+⟩^n`.
    #[default]
    Qaoa,
    /// Ry rotations with a CZ ladder.
    HardwareEfficient,
}

impl fmt::Display for AnsatzKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnsatzKind::Qaoa => f.write_str("qaoa"),
            AnsatzKind::HardwareEfficient => f.write_str("hardware-efficient"),
        }
    }
}

/// The combinatorial problem in a run file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProblemSpec {
    /// Number partitioning of `set`.
    Partition {
        /// The multiset to split.
        set: Vec<f64>,
    },
    /// Max-Cut on an edge list.
    Maxcut {
        /// Edges as `[a, b]` or `[a, b, weight]`.
        edges: Vec<Edge>,
        /// Node count; defaults to one past the largest endpoint.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        n_nodes: Option<usize>,
    },
}

/// One graph edge, optionally weighted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Edge {
    /// Unit weight.
    Plain(usize, usize),
    /// Explicit weight.
    Weighted(usize, usize, f64),
}

impl Edge {
    fn weighted(self) -> (usize, usize, f64) {
        match self {
            Edge::Plain(a, b) => (a, b, 1.0),
            Edge::Weighted(a, b, w) => (a, b, w),
        }
    }
}

/// A problem instance the optimizer can run.
pub type SharedProblem = Arc<dyn Problem + Send + Sync>;

impl ProblemSpec {
    /// Build the problem.
    pub fn build(&self) -> Result<SharedProblem> {
        match self {
            ProblemSpec::Partition { set } => Ok(Arc::new(
                NumberPartition::new(set.clone()).context("invalid partition set")?,
            )),
            ProblemSpec::Maxcut { edges, n_nodes } => {
                let edges: Vec<_> = edges.iter().map(|e| e.weighted()).collect();
                let n = n_nodes.unwrap_or_else(|| {
                    edges.iter().map(|&(a, b, _)| a.max(b) + 1).max().unwrap_or(0)
                });
                Ok(Arc::new(MaxCut::weighted(n, edges).context("invalid graph")?))
            }
        }
    }
}

/// Contents of a `varq run` problem file.
///
/// ```yaml
/// problem:
///   kind: partition
///   set: [1, 4, 3]
/// ansatz: hardware-efficient
/// layers: 1
/// optimizer:
///   method:
///     name: adam
///     learning_rate: 0.1
///   max_iterations: 200
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    /// What to solve.
    pub problem: ProblemSpec,

    /// Circuit family.
    #[serde(default)]
    pub ansatz: AnsatzKind,

    /// Layer repetitions.
    #[serde(default = "default_layers")]
    pub layers: usize,

    /// Sampled shots per evaluation; exact `⟨H_P⟩` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shots: Option<u32>,

    /// Optimizer settings.
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

fn default_layers() -> usize {
    1
}

impl RunFile {
    /// Load a run file from YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read problem file: {}", path.display()))?;
        serde_yaml_ng::from_str(&source)
            .with_context(|| format!("Failed to parse problem file: {}", path.display()))
    }
}

/// Parse `"1,4,3"` into partition values.
pub fn parse_set(s: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>()
                .with_context(|| format!("Invalid set element: '{t}'"))
        })
        .collect()
}

/// Parse `"0-1,1-2:2.5"` into edges; `:w` sets a weight.
pub fn parse_edges(s: &str) -> Result<Vec<Edge>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| -> Result<Edge> {
            let (pair, weight) = match t.split_once(':') {
                Some((pair, w)) => (
                    pair,
                    Some(
                        w.parse::<f64>()
                            .with_context(|| format!("Invalid edge weight in '{t}'"))?,
                    ),
                ),
                None => (t, None),
            };
            let (a, b) = pair
                .split_once('-')
                .ok_or_else(|| anyhow::anyhow!("Invalid edge '{t}': expected a-b"))?;
            let a = a
                .trim()
                .parse()
                .with_context(|| format!("Invalid node in edge '{t}'"))?;
            let b = b
                .trim()
                .parse()
                .with_context(|| format!("Invalid node in edge '{t}'"))?;
            Ok(match weight {
                Some(w) => Edge::Weighted(a, b, w),
                None => Edge::Plain(a, b),
            })
        })
        .collect()
}

/// The circuit for `problem` under `ansatz` with `layers` repetitions.
pub fn build_circuit(problem: &dyn Problem, ansatz: AnsatzKind, layers: usize) -> Result<Circuit> {
    let n = problem.n_qubits();
    let circuit = match ansatz {
        AnsatzKind::Qaoa => ansatz::qaoa_with_width(&problem.hamiltonian(), n, layers),
        AnsatzKind::HardwareEfficient => ansatz::hardware_efficient(n, layers),
    };
    circuit.context("Failed to build circuit")
}

/// Observable `H_P`, or the classical cost averaged over sampled shots.
pub fn build_cost(problem: &SharedProblem, shots: Option<u32>) -> Result<CostEvaluator> {
    let spec = match shots {
        None => CostSpec::observable(problem.hamiltonian()),
        Some(shots) => {
            let problem = Arc::clone(problem);
            CostSpec::bitstring(
                move |b: &Bitstring| problem.cost(b),
                ShotPolicy::Sampled { shots },
            )
        }
    };
    CostEvaluator::from_spec(spec).context("Failed to build cost evaluator")
}
