//! Standard gate matrices.
//!
//! Two-qubit gates use the local ordering described in [`crate::operator`]:
//! the first listed qubit is local bit 0. For [`cx`] that qubit is the
//! control.

use std::f64::consts::FRAC_1_SQRT_2;

use ndarray::arr2;
use num_complex::Complex64;

use crate::hamiltonian::PauliOp;
use crate::operator::Operator;

const O: Complex64 = Complex64::new(0.0, 0.0);
const L: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

fn single(e: [Complex64; 4]) -> Operator {
    Operator::from_parts(arr2(&[[e[0], e[1]], [e[2], e[3]]]), 1)
}

fn double(e: [Complex64; 16]) -> Operator {
    Operator::from_parts(
        arr2(&[
            [e[0], e[1], e[2], e[3]],
            [e[4], e[5], e[6], e[7]],
            [e[8], e[9], e[10], e[11]],
            [e[12], e[13], e[14], e[15]],
        ]),
        2,
    )
}

/// Hadamard.
pub fn h() -> Operator {
    let s = Complex64::new(FRAC_1_SQRT_2, 0.0);
    single([s, s, s, -s])
}

/// Pauli-X.
pub fn x() -> Operator {
    single([O, L, L, O])
}

/// Pauli-Y.
pub fn y() -> Operator {
    single([O, -I, I, O])
}

/// Pauli-Z.
pub fn z() -> Operator {
    single([L, O, O, -L])
}

/// Phase gate S = diag(1, i).
pub fn s() -> Operator {
    single([L, O, O, I])
}

/// T = diag(1, e^{iπ/4}).
pub fn t() -> Operator {
    single([L, O, O, Complex64::from_polar(1.0, std::f64::consts::FRAC_PI_4)])
}

/// Rx(θ) = exp(-i θ/2 X).
pub fn rx(theta: f64) -> Operator {
    let c = Complex64::new((theta / 2.0).cos(), 0.0);
    let s = Complex64::new(0.0, -(theta / 2.0).sin());
    single([c, s, s, c])
}

/// Ry(θ) = exp(-i θ/2 Y).
pub fn ry(theta: f64) -> Operator {
    let c = Complex64::new((theta / 2.0).cos(), 0.0);
    let s = Complex64::new((theta / 2.0).sin(), 0.0);
    single([c, -s, s, c])
}

/// Rz(θ) = exp(-i θ/2 Z).
pub fn rz(theta: f64) -> Operator {
    single([
        Complex64::from_polar(1.0, -theta / 2.0),
        O,
        O,
        Complex64::from_polar(1.0, theta / 2.0),
    ])
}

/// CNOT with the first listed qubit as control.
pub fn cx() -> Operator {
    // Local index = control + 2·target; swap |c=1,t=0⟩ (1) and |c=1,t=1⟩ (3).
    double([
        L, O, O, O, //
        O, O, O, L, //
        O, O, L, O, //
        O, L, O, O, //
    ])
}

/// Controlled-Z.
pub fn cz() -> Operator {
    double([
        L, O, O, O, //
        O, L, O, O, //
        O, O, L, O, //
        O, O, O, -L, //
    ])
}

/// SWAP.
pub fn swap() -> Operator {
    double([
        L, O, O, O, //
        O, O, L, O, //
        O, L, O, O, //
        O, O, O, L, //
    ])
}

/// RZZ(θ) = exp(-i θ/2 Z⊗Z).
pub fn rzz(theta: f64) -> Operator {
    let even = Complex64::from_polar(1.0, -theta / 2.0);
    let odd = Complex64::from_polar(1.0, theta / 2.0);
    double([
        even, O, O, O, //
        O, odd, O, O, //
        O, O, odd, O, //
        O, O, O, even, //
    ])
}

/// The single-qubit matrix of a Pauli operator.
pub fn pauli(op: PauliOp) -> Operator {
    match op {
        PauliOp::I => Operator::identity(1),
        PauliOp::X => x(),
        PauliOp::Y => y(),
        PauliOp::Z => z(),
    }
}
