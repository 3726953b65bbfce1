//! Combinatorial problems encoded as diagonal Ising Hamiltonians.
//!
//! Each problem provides its cost Hamiltonian `H_P`, whose diagonal entry
//! for basis state `x` equals the classical cost of `x`, and a [`LabelMap`]
//! that renders bitstrings as human-readable assignments.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use varq_sim::{Bitstring, Hamiltonian, HamiltonianTerm, MAX_QUBITS, SimError};

use crate::error::{VqaError, VqaResult};

/// A binary optimization problem over `n_qubits` variables.
pub trait Problem {
    /// Short name for reports.
    fn name(&self) -> &str;

    /// Number of binary variables.
    fn n_qubits(&self) -> usize;

    /// Classical cost of an assignment (lower is better).
    fn cost(&self, bitstring: &Bitstring) -> f64;

    /// Cost Hamiltonian with `⟨x|H_P|x⟩ = cost(x)`.
    fn hamiltonian(&self) -> Hamiltonian;

    /// Label for every assignment.
    fn labels(&self) -> LabelMap {
        let n = self.n_qubits();
        (0..1usize << n)
            .map(|i| {
                let b = Bitstring::new(i, n);
                (b, self.describe(&b))
            })
            .collect()
    }

    /// Human-readable form of one assignment.
    fn describe(&self, bitstring: &Bitstring) -> String {
        bitstring.to_string()
    }

    /// All optimal assignments and the optimal cost, by enumeration.
    fn optimum(&self) -> (Vec<Bitstring>, f64) {
        let n = self.n_qubits();
        let mut best = f64::INFINITY;
        let mut argmin = Vec::new();
        for i in 0..1usize << n {
            let b = Bitstring::new(i, n);
            let c = self.cost(&b);
            if c < best - 1e-12 {
                best = c;
                argmin.clear();
                argmin.push(b);
            } else if (c - best).abs() <= 1e-12 {
                argmin.push(b);
            }
        }
        (argmin, best)
    }
}

/// Bitstring → label lookup used when reporting outcome distributions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    labels: FxHashMap<Bitstring, String>,
}

impl LabelMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label of `bitstring`.
    pub fn insert(&mut self, bitstring: Bitstring, label: impl Into<String>) {
        self.labels.insert(bitstring, label.into());
    }

    /// Label of `bitstring`, if any.
    pub fn get(&self, bitstring: &Bitstring) -> Option<&str> {
        self.labels.get(bitstring).map(String::as_str)
    }

    /// Number of labelled bitstrings.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if nothing is labelled.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<(Bitstring, String)> for LabelMap {
    fn from_iter<I: IntoIterator<Item = (Bitstring, String)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

fn check_width(n: usize) -> VqaResult<()> {
    if n == 0 {
        return Err(VqaError::InvalidConfig("problem has no variables".into()));
    }
    if n > MAX_QUBITS {
        return Err(SimError::TooManyQubits {
            requested: n,
            max: MAX_QUBITS,
        }
        .into());
    }
    Ok(())
}

fn format_set(items: impl Iterator<Item = String>) -> String {
    format!("{{{}}}", items.collect::<Vec<_>>().join(", "))
}

// ---------------------------------------------------------------------------
// Number partitioning
// ---------------------------------------------------------------------------

/// Split a multiset `S` into two parts with equal sums.
///
/// Qubit `i` holds element `s_i`; outcome 0 puts it in the first part. The
/// cost is the squared difference of the part sums,
/// `(Σ s_i z_i)² = Σ s_i² + 2 Σ_{i<j} s_i s_j z_i z_j`, so
/// `H_P = Σ s_i² I + 2 Σ_{i<j} s_i s_j Z_i Z_j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberPartition {
    values: Vec<f64>,
}

impl NumberPartition {
    /// Partition problem over `values`.
    pub fn new(values: Vec<f64>) -> VqaResult<Self> {
        check_width(values.len())?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(VqaError::InvalidConfig(
                "partition values must be finite".into(),
            ));
        }
        Ok(Self { values })
    }

    /// The multiset.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The two parts selected by `bitstring`.
    pub fn split(&self, bitstring: &Bitstring) -> (Vec<f64>, Vec<f64>) {
        let mut first = Vec::new();
        let mut second = Vec::new();
        for (i, s) in self.values.iter().enumerate() {
            if bitstring.bit(i) {
                second.push(*s);
            } else {
                first.push(*s);
            }
        }
        (first, second)
    }

    /// Signed difference of the part sums.
    pub fn imbalance(&self, bitstring: &Bitstring) -> f64 {
        self.values
            .iter()
            .enumerate()
            .map(|(i, s)| s * bitstring.spin(i))
            .sum()
    }
}

impl Problem for NumberPartition {
    fn name(&self) -> &str {
        "number-partition"
    }

    fn n_qubits(&self) -> usize {
        self.values.len()
    }

    fn cost(&self, bitstring: &Bitstring) -> f64 {
        self.imbalance(bitstring).powi(2)
    }

    fn hamiltonian(&self) -> Hamiltonian {
        let offset: f64 = self.values.iter().map(|s| s * s).sum();
        let mut terms = vec![HamiltonianTerm::identity(offset)];
        for i in 0..self.values.len() {
            for j in (i + 1)..self.values.len() {
                terms.push(HamiltonianTerm::zz(i, j, 2.0 * self.values[i] * self.values[j]));
            }
        }
        Hamiltonian::from_terms(terms)
    }

    fn describe(&self, bitstring: &Bitstring) -> String {
        let (a, b) = self.split(bitstring);
        format!(
            "{} vs {}",
            format_set(a.iter().map(|v| format!("{v}"))),
            format_set(b.iter().map(|v| format!("{v}")))
        )
    }
}

impl fmt::Display for NumberPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Partition {}",
            format_set(self.values.iter().map(|v| format!("{v}")))
        )
    }
}

// ---------------------------------------------------------------------------
// Max-Cut
// ---------------------------------------------------------------------------

/// Weighted Max-Cut on an undirected graph.
///
/// Qubit `i` is node `i`; the cost of an assignment is minus its cut value,
/// so `H_P = Σ_{(i,j)} (w_ij / 2)(Z_i Z_j − I)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxCut {
    n_nodes: usize,
    edges: Vec<(usize, usize, f64)>,
}

impl MaxCut {
    /// Unweighted graph.
    pub fn new(n_nodes: usize, edges: Vec<(usize, usize)>) -> VqaResult<Self> {
        Self::weighted(n_nodes, edges.into_iter().map(|(a, b)| (a, b, 1.0)).collect())
    }

    /// Weighted graph.
    pub fn weighted(n_nodes: usize, edges: Vec<(usize, usize, f64)>) -> VqaResult<Self> {
        check_width(n_nodes)?;
        for &(a, b, w) in &edges {
            if a >= n_nodes || b >= n_nodes {
                return Err(SimError::QubitOutOfRange {
                    qubit: a.max(b),
                    n_qubits: n_nodes,
                }
                .into());
            }
            if a == b {
                return Err(VqaError::InvalidConfig(format!("self-loop on node {a}")));
            }
            if !w.is_finite() {
                return Err(VqaError::InvalidConfig(format!(
                    "edge {a}-{b} has non-finite weight"
                )));
            }
        }
        Ok(Self { n_nodes, edges })
    }

    /// Graph whose node count is one past the largest endpoint.
    pub fn from_edges(edges: Vec<(usize, usize)>) -> VqaResult<Self> {
        let n_nodes = edges.iter().map(|&(a, b)| a.max(b) + 1).max().unwrap_or(0);
        Self::new(n_nodes, edges)
    }

    /// 4-node cycle.
    ///
    /// ```text
    /// 0 --- 1
    /// |     |
    /// 3 --- 2
    /// ```
    pub fn square() -> Self {
        Self {
            n_nodes: 4,
            edges: vec![(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (3, 0, 1.0)],
        }
    }

    /// Node count.
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Edges as `(a, b, weight)`.
    pub fn edges(&self) -> &[(usize, usize, f64)] {
        &self.edges
    }

    /// Total weight of edges crossing the cut.
    pub fn cut_value(&self, bitstring: &Bitstring) -> f64 {
        self.edges
            .iter()
            .filter(|(a, b, _)| bitstring.bit(*a) != bitstring.bit(*b))
            .map(|(_, _, w)| w)
            .sum()
    }
}

impl Problem for MaxCut {
    fn name(&self) -> &str {
        "max-cut"
    }

    fn n_qubits(&self) -> usize {
        self.n_nodes
    }

    fn cost(&self, bitstring: &Bitstring) -> f64 {
        -self.cut_value(bitstring)
    }

    fn hamiltonian(&self) -> Hamiltonian {
        let offset: f64 = self.edges.iter().map(|(_, _, w)| w / 2.0).sum();
        let mut terms = vec![HamiltonianTerm::identity(-offset)];
        terms.extend(
            self.edges
                .iter()
                .map(|&(a, b, w)| HamiltonianTerm::zz(a, b, w / 2.0)),
        );
        Hamiltonian::from_terms(terms)
    }

    fn describe(&self, bitstring: &Bitstring) -> String {
        let side = |bit: bool| {
            format_set(
                (0..self.n_nodes)
                    .filter(|&i| bitstring.bit(i) == bit)
                    .map(|i| i.to_string()),
            )
        };
        format!("S={} T={}", side(false), side(true))
    }
}

impl fmt::Display for MaxCut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph ({} nodes, {} edges):", self.n_nodes, self.edges.len())?;
        for (a, b, w) in &self.edges {
            if (*w - 1.0).abs() < 1e-10 {
                writeln!(f, "  {a} -- {b}")?;
            } else {
                writeln!(f, "  {a} -- {b} (weight: {w:.2})")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use varq_sim::Statevector;

    fn basis(b: Bitstring) -> Statevector {
        let mut amps = vec![varq_sim::Complex64::new(0.0, 0.0); 1 << b.n_qubits()];
        amps[b.value()] = varq_sim::Complex64::new(1.0, 0.0);
        Statevector::from_amplitudes(amps).unwrap()
    }

    #[test]
    fn test_partition_optimum() {
        let problem = NumberPartition::new(vec![1.0, 4.0, 3.0]).unwrap();
        let (best, cost) = problem.optimum();
        assert_eq!(cost, 0.0);
        let mut names: Vec<String> = best.iter().map(ToString::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["010", "101"]);
    }

    #[test]
    fn test_partition_hamiltonian_diagonal_matches_cost() {
        let problem = NumberPartition::new(vec![1.0, 4.0, 3.0]).unwrap();
        let h = problem.hamiltonian();
        for i in 0..8 {
            let b = Bitstring::new(i, 3);
            let energy = h.expectation(&basis(b)).unwrap();
            assert!((energy - problem.cost(&b)).abs() < 1e-9, "{b}");
        }
    }

    #[test]
    fn test_partition_labels() {
        let problem = NumberPartition::new(vec![1.0, 4.0, 3.0]).unwrap();
        let labels = problem.labels();
        assert_eq!(labels.len(), 8);
        let b: Bitstring = "010".parse().unwrap();
        assert_eq!(labels.get(&b), Some("{1, 3} vs {4}"));
    }

    #[test]
    fn test_maxcut_square() {
        let graph = MaxCut::square();
        let (best, cost) = graph.optimum();
        assert_eq!(cost, -4.0);
        assert_eq!(best.len(), 2);
        let h = graph.hamiltonian();
        for b in best {
            assert!((h.expectation(&basis(b)).unwrap() + 4.0).abs() < 1e-9);
        }
        let b: Bitstring = "0101".parse().unwrap();
        assert_eq!(graph.describe(&b), "S={0, 2} T={1, 3}");
    }

    #[test]
    fn test_maxcut_rejects_bad_edges() {
        assert!(MaxCut::new(3, vec![(0, 3)]).is_err());
        assert!(MaxCut::new(3, vec![(1, 1)]).is_err());
        assert!(MaxCut::from_edges(vec![]).is_err());
        assert_eq!(MaxCut::from_edges(vec![(0, 1), (1, 4)]).unwrap().n_nodes(), 5);
    }
}
