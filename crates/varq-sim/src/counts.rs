//! Measurement outcomes: bitstrings and shot counts.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A classical measurement outcome of an `n_qubits` register.
///
/// Bit `q` of `value` is the outcome of qubit `q`. The textual form lists
/// qubit 0 first, so `Bitstring::new(0b001, 3)` displays as `"100"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bitstring {
    value: usize,
    n_qubits: usize,
}

impl Bitstring {
    /// Create a bitstring from a basis-state index.
    pub fn new(value: usize, n_qubits: usize) -> Self {
        let mask = if n_qubits >= usize::BITS as usize {
            usize::MAX
        } else {
            (1usize << n_qubits) - 1
        };
        Self {
            value: value & mask,
            n_qubits,
        }
    }

    /// Basis-state index.
    pub fn value(&self) -> usize {
        self.value
    }

    /// Register width.
    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    /// Outcome of qubit `q`.
    pub fn bit(&self, q: usize) -> bool {
        (self.value >> q) & 1 == 1
    }

    /// Outcomes as a vector, qubit 0 first.
    pub fn bits(&self) -> Vec<bool> {
        (0..self.n_qubits).map(|q| self.bit(q)).collect()
    }

    /// ±1 eigenvalue of Z on qubit `q` (`+1` for outcome 0).
    pub fn spin(&self, q: usize) -> f64 {
        if self.bit(q) { -1.0 } else { 1.0 }
    }

    /// Number of qubits measured as 1.
    pub fn count_ones(&self) -> u32 {
        self.value.count_ones()
    }

    /// Bitwise complement within the register width.
    pub fn complement(&self) -> Self {
        Self::new(!self.value, self.n_qubits)
    }
}

impl fmt::Display for Bitstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for q in 0..self.n_qubits {
            f.write_str(if self.bit(q) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Error returned when parsing a [`Bitstring`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ParseBitstringError {
    #[error("invalid bitstring character '{0}'")]
    InvalidCharacter(char),

    #[error("bitstring of {0} qubits does not fit in {max} bits", max = usize::BITS)]
    TooWide(usize),
}

impl FromStr for Bitstring {
    type Err = ParseBitstringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut value = 0usize;
        let mut n_qubits = 0usize;
        for (q, ch) in s.chars().enumerate() {
            match ch {
                '0' => {}
                '1' if q < usize::BITS as usize => value |= 1 << q,
                '1' => return Err(ParseBitstringError::TooWide(s.chars().count())),
                other => return Err(ParseBitstringError::InvalidCharacter(other)),
            }
            n_qubits += 1;
        }
        Ok(Self::new(value, n_qubits))
    }
}

/// Histogram of sampled outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counts {
    counts: FxHashMap<Bitstring, u64>,
}

impl Counts {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` more occurrences of `outcome`.
    pub fn insert(&mut self, outcome: Bitstring, count: u64) {
        *self.counts.entry(outcome).or_insert(0) += count;
    }

    /// Occurrences of `outcome`.
    pub fn get(&self, outcome: &Bitstring) -> u64 {
        self.counts.get(outcome).copied().unwrap_or(0)
    }

    /// Total number of recorded shots.
    pub fn total_shots(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Fold another histogram into this one.
    pub fn merge(&mut self, other: Counts) {
        for (outcome, count) in other.counts {
            self.insert(outcome, count);
        }
    }

    /// Outcomes sorted by descending count, ties broken by outcome.
    pub fn sorted(&self) -> Vec<(Bitstring, u64)> {
        let mut v: Vec<_> = self.counts.iter().map(|(b, c)| (*b, *c)).collect();
        v.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        v
    }

    /// Iterate over `(outcome, count)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bitstring, &u64)> {
        self.counts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_qubit_zero_first() {
        assert_eq!(Bitstring::new(0b001, 3).to_string(), "100");
        assert_eq!(Bitstring::new(0b110, 3).to_string(), "011");
    }

    #[test]
    fn test_parse_roundtrip() {
        let b: Bitstring = "0101".parse().unwrap();
        assert_eq!(b.value(), 0b1010);
        assert_eq!(b.to_string(), "0101");
        assert_eq!(
            "01x".parse::<Bitstring>(),
            Err(ParseBitstringError::InvalidCharacter('x'))
        );
    }

    #[test]
    fn test_parse_rejects_overwide_register() {
        let wide = format!("{}1", "0".repeat(usize::BITS as usize));
        assert_eq!(
            wide.parse::<Bitstring>(),
            Err(ParseBitstringError::TooWide(usize::BITS as usize + 1))
        );

        // Zeros beyond the word width carry no value and still parse.
        let zeros = "0".repeat(usize::BITS as usize + 4);
        assert_eq!(zeros.parse::<Bitstring>().unwrap().value(), 0);
    }

    #[test]
    fn test_spin_and_complement() {
        let b = Bitstring::new(0b010, 3);
        assert_eq!(b.spin(0), 1.0);
        assert_eq!(b.spin(1), -1.0);
        assert_eq!(b.complement().value(), 0b101);
    }

    #[test]
    fn test_counts_merge_and_sort() {
        let mut a = Counts::new();
        a.insert(Bitstring::new(0, 2), 3);
        a.insert(Bitstring::new(3, 2), 5);
        let mut b = Counts::new();
        b.insert(Bitstring::new(0, 2), 4);
        a.merge(b);

        assert_eq!(a.total_shots(), 12);
        let sorted = a.sorted();
        assert_eq!(sorted[0], (Bitstring::new(0, 2), 7));
        assert_eq!(sorted[1], (Bitstring::new(3, 2), 5));
    }
}
