//! Dense operators over a qubit subset.
//!
//! An [`Operator`] on `k` qubits is a `2^k × 2^k` complex matrix stored as an
//! `ndarray::Array2`. Operators are position-free: the qubits they act on are
//! supplied when applying or embedding them, with local index bit `j` bound
//! to the `j`-th listed qubit.

use ndarray::Array2;
use num_complex::Complex64;

use crate::error::{SimError, SimResult};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Tolerance used when classifying an operator as diagonal.
const DIAGONAL_EPS: f64 = 1e-14;

/// A dense complex operator on `n_qubits` qubits.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    matrix: Array2<Complex64>,
    n_qubits: usize,
}

impl Operator {
    /// Wrap a square matrix whose side is a power of two.
    pub fn from_matrix(matrix: Array2<Complex64>) -> SimResult<Self> {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            return Err(SimError::DimensionMismatch {
                expected: rows,
                got: cols,
            });
        }
        let n_qubits = qubits_for_dim(rows)?;
        Ok(Self { matrix, n_qubits })
    }

    /// Build from row-major entries of a `dim × dim` matrix.
    pub fn from_row_major(dim: usize, entries: Vec<Complex64>) -> SimResult<Self> {
        let got = entries.len();
        let matrix = Array2::from_shape_vec((dim, dim), entries).map_err(|_| {
            SimError::DimensionMismatch {
                expected: dim * dim,
                got,
            }
        })?;
        Self::from_matrix(matrix)
    }

    /// Build a diagonal operator.
    pub fn from_diagonal(diagonal: &[Complex64]) -> SimResult<Self> {
        let dim = diagonal.len();
        let mut matrix = Array2::from_elem((dim, dim), ZERO);
        for (i, d) in diagonal.iter().enumerate() {
            matrix[[i, i]] = *d;
        }
        Self::from_matrix(matrix)
    }

    /// Wrap a matrix already known to be `2^n_qubits` square.
    pub(crate) fn from_parts(matrix: Array2<Complex64>, n_qubits: usize) -> Self {
        debug_assert_eq!(matrix.dim(), (1 << n_qubits, 1 << n_qubits));
        Self { matrix, n_qubits }
    }

    /// The identity on `n_qubits` qubits.
    pub fn identity(n_qubits: usize) -> Self {
        let dim = 1usize << n_qubits;
        let mut matrix = Array2::from_elem((dim, dim), ZERO);
        for i in 0..dim {
            matrix[[i, i]] = ONE;
        }
        Self { matrix, n_qubits }
    }

    /// The zero operator on `n_qubits` qubits.
    pub fn zeros(n_qubits: usize) -> Self {
        let dim = 1usize << n_qubits;
        Self {
            matrix: Array2::from_elem((dim, dim), ZERO),
            n_qubits,
        }
    }

    /// Number of qubits this operator acts on.
    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    /// Matrix side length, `2^n_qubits`.
    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    /// Borrow the underlying matrix.
    pub fn matrix(&self) -> &Array2<Complex64> {
        &self.matrix
    }

    pub(crate) fn matrix_mut(&mut self) -> &mut Array2<Complex64> {
        &mut self.matrix
    }

    /// Entry at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.matrix[[row, col]]
    }

    /// Matrix product `self · other`: `other` acts first.
    pub fn compose(&self, other: &Operator) -> SimResult<Operator> {
        self.check_same_dim(other)?;
        Ok(Self {
            matrix: self.matrix.dot(&other.matrix),
            n_qubits: self.n_qubits,
        })
    }

    /// Tensor product `self ⊗ other`.
    ///
    /// `other` occupies the low (less significant) local index bits.
    pub fn kron(&self, other: &Operator) -> Operator {
        Self {
            matrix: ndarray::linalg::kron(&self.matrix, &other.matrix),
            n_qubits: self.n_qubits + other.n_qubits,
        }
    }

    /// Multiply every entry by `factor`.
    pub fn scale(&self, factor: Complex64) -> Operator {
        Self {
            matrix: self.matrix.mapv(|z| z * factor),
            n_qubits: self.n_qubits,
        }
    }

    /// Entry-wise sum.
    pub fn add(&self, other: &Operator) -> SimResult<Operator> {
        self.check_same_dim(other)?;
        Ok(Self {
            matrix: &self.matrix + &other.matrix,
            n_qubits: self.n_qubits,
        })
    }

    /// Entry-wise difference.
    pub fn sub(&self, other: &Operator) -> SimResult<Operator> {
        self.check_same_dim(other)?;
        Ok(Self {
            matrix: &self.matrix - &other.matrix,
            n_qubits: self.n_qubits,
        })
    }

    /// Conjugate transpose.
    pub fn adjoint(&self) -> Operator {
        Self {
            matrix: self.matrix.t().mapv(|z| z.conj()),
            n_qubits: self.n_qubits,
        }
    }

    /// The diagonal, if every off-diagonal entry is (numerically) zero.
    pub fn diagonal(&self) -> Option<Vec<Complex64>> {
        for ((r, c), z) in self.matrix.indexed_iter() {
            if r != c && z.norm_sqr() > DIAGONAL_EPS {
                return None;
            }
        }
        Some(self.matrix.diag().to_vec())
    }

    /// True if `self† · self ≈ I` within `tol` (max-entry norm).
    pub fn is_unitary(&self, tol: f64) -> bool {
        let product = self.adjoint().matrix.dot(&self.matrix);
        product
            .indexed_iter()
            .all(|((r, c), z)| (*z - if r == c { ONE } else { ZERO }).norm() <= tol)
    }

    /// True if every entry differs from `other` by at most `tol`.
    pub fn approx_eq(&self, other: &Operator, tol: f64) -> bool {
        self.dim() == other.dim()
            && self
                .matrix
                .iter()
                .zip(other.matrix.iter())
                .all(|(a, b)| (*a - *b).norm() <= tol)
    }

    /// Lift this operator onto an `n_qubits` register, acting on `qubits`.
    pub fn embed(&self, qubits: &[usize], n_qubits: usize) -> SimResult<Operator> {
        validate_targets(qubits, self.n_qubits, n_qubits)?;
        let dim = 1usize << n_qubits;
        let mask = qubit_mask(qubits);
        let offsets = local_offsets(qubits);

        let mut matrix = Array2::from_elem((dim, dim), ZERO);
        for row in 0..dim {
            let local_row = gather_bits(row, qubits);
            let rest = row & !mask;
            for (local_col, offset) in offsets.iter().enumerate() {
                matrix[[row, rest | *offset]] = self.matrix[[local_row, local_col]];
            }
        }
        Ok(Self { matrix, n_qubits })
    }

    fn check_same_dim(&self, other: &Operator) -> SimResult<()> {
        if self.dim() != other.dim() {
            return Err(SimError::DimensionMismatch {
                expected: self.dim(),
                got: other.dim(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Index helpers shared with the statevector
// ---------------------------------------------------------------------------

fn qubits_for_dim(dim: usize) -> SimResult<usize> {
    if dim == 0 || !dim.is_power_of_two() {
        return Err(SimError::DimensionMismatch {
            expected: dim.next_power_of_two().max(1),
            got: dim,
        });
    }
    Ok(dim.trailing_zeros() as usize)
}

/// Check that `qubits` are distinct, in range, and match the operator width.
pub(crate) fn validate_targets(
    qubits: &[usize],
    operator_qubits: usize,
    n_qubits: usize,
) -> SimResult<()> {
    if qubits.len() != operator_qubits {
        return Err(SimError::DimensionMismatch {
            expected: 1 << operator_qubits,
            got: 1 << qubits.len(),
        });
    }
    for (i, &q) in qubits.iter().enumerate() {
        if q >= n_qubits {
            return Err(SimError::QubitOutOfRange { qubit: q, n_qubits });
        }
        if qubits[..i].contains(&q) {
            return Err(SimError::DuplicateQubit(q));
        }
    }
    Ok(())
}

/// Bit mask with every listed qubit set.
pub(crate) fn qubit_mask(qubits: &[usize]) -> usize {
    qubits.iter().fold(0, |m, q| m | (1 << q))
}

/// Register offset for every local index: local bit `j` → qubit `qubits[j]`.
pub(crate) fn local_offsets(qubits: &[usize]) -> Vec<usize> {
    (0..1usize << qubits.len())
        .map(|local| {
            qubits
                .iter()
                .enumerate()
                .filter(|(j, _)| (local >> j) & 1 == 1)
                .fold(0, |acc, (_, q)| acc | (1 << q))
        })
        .collect()
}

/// Extract the local index of `index` with respect to `qubits`.
pub(crate) fn gather_bits(index: usize, qubits: &[usize]) -> usize {
    qubits
        .iter()
        .enumerate()
        .fold(0, |acc, (j, q)| acc | (((index >> q) & 1) << j))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates;

    #[test]
    fn test_identity_is_unitary_and_diagonal() {
        let id = Operator::identity(2);
        assert_eq!(id.dim(), 4);
        assert!(id.is_unitary(1e-12));
        assert_eq!(id.diagonal().unwrap(), vec![ONE; 4]);
    }

    #[test]
    fn test_non_power_of_two_rejected() {
        let err = Operator::from_row_major(3, vec![ZERO; 9]).unwrap_err();
        assert!(matches!(err, SimError::DimensionMismatch { got: 3, .. }));
    }

    #[test]
    fn test_wrong_entry_count_rejected() {
        assert!(Operator::from_row_major(2, vec![ZERO; 3]).is_err());
    }

    #[test]
    fn test_compose_order() {
        // X·Z applied to |0⟩: Z acts first (no-op), then X → |1⟩.
        let xz = gates::x().compose(&gates::z()).unwrap();
        assert!((xz.get(1, 0) - ONE).norm() < 1e-12);
        // Z·X: X first → |1⟩, then Z → -|1⟩.
        let zx = gates::z().compose(&gates::x()).unwrap();
        assert!((zx.get(1, 0) + ONE).norm() < 1e-12);
    }

    #[test]
    fn test_embed_matches_kron() {
        // X on qubit 1 of a 2-qubit register equals X ⊗ I (qubit 1 is the high bit).
        let embedded = gates::x().embed(&[1], 2).unwrap();
        let expected = gates::x().kron(&Operator::identity(1));
        assert!(embedded.approx_eq(&expected, 1e-12));
    }

    #[test]
    fn test_embed_rejects_duplicate_qubits() {
        let err = gates::cx().embed(&[0, 0], 2).unwrap_err();
        assert!(matches!(err, SimError::DuplicateQubit(0)));
    }

    #[test]
    fn test_embed_rejects_out_of_range() {
        let err = gates::h().embed(&[3], 2).unwrap_err();
        assert!(matches!(err, SimError::QubitOutOfRange { qubit: 3, .. }));
    }

    #[test]
    fn test_local_offsets_and_gather_are_inverse() {
        let qubits = [2, 0];
        let offsets = local_offsets(&qubits);
        for (local, offset) in offsets.iter().enumerate() {
            assert_eq!(gather_bits(*offset, &qubits), local);
        }
    }
}
