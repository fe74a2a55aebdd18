// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// The gate catalog. Three tiers: intrinsics are emitted verbatim and form
// the target set of unrolling; decomposables carry a fixed recipe expressed
// in intrinsics; user-defined gates are expanded by the visitor. Everything
// here operates on resolved operands.

use crate::ast::{Expr, GPhase, GateCall, GateOperand, Span, Stmt};
use crate::error::{Error, Result};

pub const PI: f64 = std::f64::consts::PI;

/// Gate-name aliases accepted on input, normalized before dispatch.
pub fn canonical_name(name: &str) -> &str {
    match name {
        "CX" | "cnot" => "cx",
        "not" => "x",
        "toffoli" | "ccnot" => "ccx",
        "v" => "sx",
        "vi" => "sxdg",
        "si" => "sdg",
        "ti" => "tdg",
        "u" | "U3" => "u3",
        "U1" | "u1" | "phaseshift" => "p",
        "U2" => "u2",
        "cphaseshift" => "cp",
        "cp00" | "cphaseshift00" => "cu1_00",
        "cp01" | "cphaseshift01" => "cu1_01",
        "cp10" | "cphaseshift10" => "cu1_10",
        "cv" => "csx",
        "xx" => "rxx",
        "yy" => "ryy",
        "zz" => "rzz",
        "c3sqrtx" => "c3sx",
        other => other,
    }
}

/// The target tier: gates that survive unrolling.
pub fn is_intrinsic(name: &str) -> bool {
    matches!(
        name,
        "U" | "gphase"
            | "id"
            | "h"
            | "x"
            | "y"
            | "z"
            | "s"
            | "sdg"
            | "t"
            | "tdg"
            | "sx"
            | "sxdg"
            | "rx"
            | "ry"
            | "rz"
            | "cx"
            | "cz"
            | "cy"
            | "swap"
            | "ccx"
    )
}

/// (number of qubits, number of parameters) for every basic gate the
/// dispatcher knows, keyed by canonical name.
pub fn signature(name: &str) -> Option<(usize, usize)> {
    let sig = match name {
        "id" | "h" | "x" | "y" | "z" | "s" | "sdg" | "t" | "tdg" | "sx" | "sxdg" => (1, 0),
        "rx" | "ry" | "rz" | "p" => (1, 1),
        "U" | "u3" => (1, 3),
        "u2" | "prx" => (1, 2),
        "gpi" | "gpi2" => (1, 1),
        "cx" | "cz" | "cy" | "ch" | "swap" | "iswap" | "csx" | "ecr" => (2, 0),
        "crx" | "cry" | "crz" | "cp" | "cu1" | "cu1_00" | "cu1_01" | "cu1_10" => (2, 1),
        "rxx" | "ryy" | "rzz" | "xy" | "pswap" => (2, 1),
        "xx_plus_yy" => (2, 2),
        "cu3" => (2, 3),
        "cu" => (2, 4),
        "ccx" | "cswap" | "rccx" => (3, 0),
        "c3sx" | "rc3x" => (4, 0),
        "c4x" => (5, 0),
        _ => return None,
    };
    Some(sig)
}

pub fn is_basic(name: &str) -> bool {
    signature(name).is_some()
}

/// Gates whose power is defined for non-integer exponents: the exponent
/// scales the rotation angle.
pub fn supports_fractional_pow(name: &str) -> bool {
    matches!(
        name,
        "rx" | "ry" | "rz" | "p" | "cp" | "cu1" | "crx" | "cry" | "crz" | "rxx" | "ryy" | "rzz"
            | "gphase"
    )
}

//
// Emission helpers. All recipes bottom out in these.
//

fn gate(name: &str, qubits: &[&GateOperand]) -> Stmt {
    GateCall::basic(name, qubits.iter().map(|q| (*q).clone()).collect()).to_stmt()
}

fn rot(name: &str, angle: f64, qubit: &GateOperand) -> Stmt {
    GateCall::with_params(name, vec![angle], vec![qubit.clone()]).to_stmt()
}

fn gphase(theta: f64, qubits: &[&GateOperand]) -> Stmt {
    GPhase::new(
        Expr::float(theta),
        qubits.iter().map(|q| (*q).clone()).collect(),
        Vec::new(),
        None,
    )
    .to_stmt()
}

// u3(theta, phi, lam) as rz / rx(pi/2) chains. The global phase
// e^{i(phi+lam)/2} is dropped.
fn u3(theta: f64, phi: f64, lam: f64, q: &GateOperand) -> Vec<Stmt> {
    vec![
        rot("rz", lam, q),
        rot("rx", PI / 2.0, q),
        rot("rz", theta + PI, q),
        rot("rx", PI / 2.0, q),
        rot("rz", phi + PI, q),
    ]
}

fn u2(phi: f64, lam: f64, q: &GateOperand) -> Vec<Stmt> {
    u3(PI / 2.0, phi, lam, q)
}

fn phaseshift(theta: f64, q: &GateOperand) -> Vec<Stmt> {
    vec![gate("h", &[q]), rot("rx", theta, q), gate("h", &[q])]
}

fn cu1(theta: f64, q0: &GateOperand, q1: &GateOperand) -> Vec<Stmt> {
    let mut out = u3(0.0, 0.0, theta / 2.0, q0);
    out.push(gate("cx", &[q0, q1]));
    out.extend(u3(0.0, 0.0, -theta / 2.0, q1));
    out.push(gate("cx", &[q0, q1]));
    out.extend(u3(0.0, 0.0, theta / 2.0, q1));
    out
}

// Relative-phase triple-controlled X on (a, b, c, target).
fn rc3x(a: &GateOperand, b: &GateOperand, c: &GateOperand, t: &GateOperand) -> Vec<Stmt> {
    let mut out = Vec::new();
    out.extend(u2(0.0, PI, t));
    out.extend(phaseshift(PI / 4.0, t));
    out.push(gate("cx", &[c, t]));
    out.extend(phaseshift(-PI / 4.0, t));
    out.extend(u2(0.0, PI, t));
    out.push(gate("cx", &[a, t]));
    out.extend(phaseshift(PI / 4.0, t));
    out.push(gate("cx", &[b, t]));
    out.extend(phaseshift(-PI / 4.0, t));
    out.push(gate("cx", &[a, t]));
    out.extend(phaseshift(PI / 4.0, t));
    out.push(gate("cx", &[b, t]));
    out.extend(phaseshift(-PI / 4.0, t));
    out.extend(u2(0.0, PI, t));
    out.extend(phaseshift(PI / 4.0, t));
    out.push(gate("cx", &[c, t]));
    out.extend(phaseshift(-PI / 4.0, t));
    out.extend(u2(0.0, PI, t));
    out
}

fn c3sx(a: &GateOperand, b: &GateOperand, c: &GateOperand, t: &GateOperand) -> Vec<Stmt> {
    let mut out = Vec::new();
    out.push(gate("h", &[t]));
    out.extend(cu1(PI / 8.0, a, t));
    out.push(gate("cx", &[a, b]));
    out.extend(cu1(-PI / 8.0, b, t));
    out.push(gate("cx", &[a, b]));
    out.extend(cu1(PI / 8.0, b, t));
    out.push(gate("cx", &[b, c]));
    out.extend(cu1(-PI / 8.0, c, t));
    out.push(gate("cx", &[a, c]));
    out.extend(cu1(PI / 8.0, c, t));
    out.push(gate("cx", &[b, c]));
    out.extend(cu1(-PI / 8.0, c, t));
    out.push(gate("cx", &[a, c]));
    out.extend(cu1(PI / 8.0, c, t));
    out.push(gate("h", &[t]));
    out
}

/// Expand one basic gate application to the intrinsic tier. `inverse`
/// applies the inverse of the gate (recipes are reversed element-wise).
pub fn expand(
    name: &str,
    params: &[f64],
    qubits: &[GateOperand],
    inverse: bool,
    span: Span,
) -> Result<Vec<Stmt>> {
    let stmts = expand_forward(name, params, qubits, span)?;
    if inverse {
        invert_intrinsic_sequence(stmts, span)
    } else {
        Ok(stmts)
    }
}

// Expansion without inversion. `name` is canonical and the arity was
// already validated against `signature`.
fn expand_forward(
    name: &str,
    params: &[f64],
    qubits: &[GateOperand],
    span: Span,
) -> Result<Vec<Stmt>> {
    let q = |i: usize| &qubits[i];
    let p = |i: usize| params[i];

    if is_intrinsic(name) {
        let stmt = match signature(name) {
            Some((_, 0)) => gate(name, &qubits.iter().collect::<Vec<_>>()),
            Some((_, 1)) => rot(name, p(0), q(0)),
            // Only `U` carries three parameters at the intrinsic tier.
            _ => GateCall::with_params(name, params.to_vec(), qubits.to_vec()).to_stmt(),
        };
        return Ok(vec![stmt]);
    }

    let out = match name {
        "u3" => u3(p(0), p(1), p(2), q(0)),
        "u2" => u2(p(0), p(1), q(0)),
        "p" => phaseshift(p(0), q(0)),
        "gpi" => u3(PI, p(0), -p(0) + PI, q(0)),
        "gpi2" => u3(PI / 2.0, p(0) - PI / 2.0, PI / 2.0 - p(0), q(0)),
        "prx" => u3(p(0), p(1) - PI / 2.0, PI / 2.0 - p(1), q(0)),

        "ch" => vec![
            gate("s", &[q(1)]),
            gate("h", &[q(1)]),
            gate("t", &[q(1)]),
            gate("cx", &[q(0), q(1)]),
            gate("tdg", &[q(1)]),
            gate("h", &[q(1)]),
            gate("sdg", &[q(1)]),
        ],
        "csx" => {
            let mut out = phaseshift(PI / 4.0, q(0));
            out.extend(u2(0.0, PI, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(phaseshift(-PI / 4.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(phaseshift(PI / 4.0, q(1)));
            out.extend(u2(0.0, PI, q(1)));
            out
        }
        "crx" => {
            let mut out = u3(0.0, 0.0, PI / 2.0, q(1));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(u3(-p(0) / 2.0, 0.0, 0.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(u3(p(0) / 2.0, -PI / 2.0, 0.0, q(1)));
            out
        }
        "cry" => {
            let mut out = u3(p(0) / 2.0, 0.0, 0.0, q(1));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(u3(-p(0) / 2.0, 0.0, 0.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out
        }
        "crz" => {
            let mut out = u3(0.0, 0.0, p(0) / 2.0, q(1));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(u3(0.0, 0.0, -p(0) / 2.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out
        }
        "cp" | "cu1" => cu1(p(0), q(0), q(1)),
        "cu1_00" => {
            let mut out = vec![gate("x", &[q(0)]), gate("x", &[q(1)])];
            out.extend(u3(0.0, 0.0, p(0) / 2.0, q(0)));
            out.extend(u3(0.0, 0.0, p(0) / 2.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(u3(0.0, 0.0, -p(0) / 2.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.push(gate("x", &[q(0)]));
            out.push(gate("x", &[q(1)]));
            out
        }
        "cu1_01" => {
            let mut out = vec![gate("x", &[q(0)])];
            out.extend(u3(0.0, 0.0, p(0) / 2.0, q(1)));
            out.extend(u3(0.0, 0.0, p(0) / 2.0, q(0)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(u3(0.0, 0.0, -p(0) / 2.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.push(gate("x", &[q(0)]));
            out
        }
        "cu1_10" => {
            let mut out = u3(0.0, 0.0, p(0) / 2.0, q(0));
            out.push(gate("x", &[q(1)]));
            out.extend(u3(0.0, 0.0, p(0) / 2.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(u3(0.0, 0.0, -p(0) / 2.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.push(gate("x", &[q(1)]));
            out
        }
        "cu3" => {
            let (theta, phi, lam) = (p(0), p(1), p(2));
            let mut out = u3(0.0, 0.0, lam / 2.0 + phi / 2.0, q(0));
            out.extend(u3(0.0, 0.0, lam / 2.0 - phi / 2.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(u3(-theta / 2.0, 0.0, -lam / 2.0 - phi / 2.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(u3(theta / 2.0, phi, 0.0, q(1)));
            out
        }
        "cu" => {
            let (theta, phi, lam, gamma) = (p(0), p(1), p(2), p(3));
            let mut out = u3(0.0, 0.0, gamma, q(0));
            out.extend(u3(0.0, 0.0, lam / 2.0 + phi / 2.0, q(0)));
            out.extend(u3(0.0, 0.0, lam / 2.0 - phi / 2.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(u3(-theta / 2.0, 0.0, -lam / 2.0 - phi / 2.0, q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out.extend(u3(theta / 2.0, phi, 0.0, q(1)));
            out
        }

        "iswap" => vec![
            gate("s", &[q(0)]),
            gate("s", &[q(1)]),
            gate("h", &[q(0)]),
            gate("cx", &[q(0), q(1)]),
            gate("cx", &[q(1), q(0)]),
            gate("h", &[q(1)]),
        ],
        "pswap" => {
            let mut out = vec![gate("swap", &[q(0), q(1)]), gate("cx", &[q(0), q(1)])];
            out.extend(u3(0.0, 0.0, p(0), q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out
        }
        "ecr" => vec![
            gate("s", &[q(0)]),
            rot("rx", PI / 2.0, q(1)),
            gate("cx", &[q(0), q(1)]),
            gate("x", &[q(0)]),
        ],
        "rxx" => vec![
            gphase(-p(0) / 2.0, &[q(0), q(1)]),
            gate("h", &[q(0)]),
            gate("h", &[q(1)]),
            gate("cx", &[q(0), q(1)]),
            rot("rz", p(0), q(1)),
            gate("cx", &[q(0), q(1)]),
            gate("h", &[q(1)]),
            gate("h", &[q(0)]),
        ],
        "ryy" => vec![
            rot("rx", PI / 2.0, q(0)),
            rot("rx", PI / 2.0, q(1)),
            gate("cx", &[q(0), q(1)]),
            rot("rz", p(0), q(1)),
            gate("cx", &[q(0), q(1)]),
            rot("rx", -PI / 2.0, q(0)),
            rot("rx", -PI / 2.0, q(1)),
        ],
        "rzz" => {
            let mut out = vec![gphase(-p(0) / 2.0, &[q(0), q(1)]), gate("cx", &[q(0), q(1)])];
            out.extend(u3(0.0, 0.0, p(0), q(1)));
            out.push(gate("cx", &[q(0), q(1)]));
            out
        }
        "xy" => return expand_forward("xx_plus_yy", &[p(0), PI], qubits, span),
        "xx_plus_yy" => {
            let (theta, phi) = (p(0), p(1));
            vec![
                rot("rz", phi, q(0)),
                rot("rz", -PI / 2.0, q(1)),
                gate("s", &[q(0)]),
                gate("sx", &[q(1)]),
                rot("rz", PI / 2.0, q(0)),
                gate("cx", &[q(1), q(0)]),
                rot("ry", -theta / 2.0, q(0)),
                rot("ry", -theta / 2.0, q(1)),
                gate("cx", &[q(1), q(0)]),
                rot("rz", -PI / 2.0, q(0)),
                gate("sxdg", &[q(1)]),
                gate("sdg", &[q(0)]),
                rot("rz", PI / 2.0, q(1)),
                rot("rz", -phi, q(0)),
            ]
        }

        "cswap" => vec![
            gate("cx", &[q(2), q(1)]),
            gate("h", &[q(2)]),
            gate("cx", &[q(1), q(2)]),
            gate("tdg", &[q(2)]),
            gate("cx", &[q(0), q(2)]),
            gate("t", &[q(2)]),
            gate("cx", &[q(1), q(2)]),
            gate("t", &[q(1)]),
            gate("tdg", &[q(2)]),
            gate("cx", &[q(0), q(2)]),
            gate("cx", &[q(0), q(1)]),
            gate("t", &[q(2)]),
            gate("t", &[q(0)]),
            gate("tdg", &[q(1)]),
            gate("h", &[q(2)]),
            gate("cx", &[q(0), q(1)]),
            gate("cx", &[q(2), q(1)]),
        ],
        "rccx" => {
            let mut out = u2(0.0, PI, q(2));
            out.extend(phaseshift(PI / 4.0, q(2)));
            out.push(gate("cx", &[q(1), q(2)]));
            out.extend(phaseshift(-PI / 4.0, q(2)));
            out.push(gate("cx", &[q(0), q(2)]));
            out.extend(phaseshift(PI / 4.0, q(2)));
            out.push(gate("cx", &[q(1), q(2)]));
            out.extend(phaseshift(-PI / 4.0, q(2)));
            out.extend(u2(0.0, PI, q(2)));
            out
        }
        "c3sx" => c3sx(q(0), q(1), q(2), q(3)),
        "rc3x" => rc3x(q(0), q(1), q(2), q(3)),
        "c4x" => {
            let mut out = Vec::new();
            out.push(gate("h", &[q(4)]));
            out.extend(cu1(PI / 2.0, q(3), q(4)));
            out.push(gate("h", &[q(4)]));
            out.extend(rc3x(q(0), q(1), q(2), q(3)));
            out.push(gate("h", &[q(4)]));
            out.extend(cu1(-PI / 2.0, q(3), q(4)));
            out.push(gate("h", &[q(4)]));
            out.extend(invert_intrinsic_sequence(
                rc3x(q(0), q(1), q(2), q(3)),
                span,
            )?);
            out.extend(c3sx(q(0), q(1), q(2), q(4)));
            out
        }
        "ms" => {
            return Err(Error::unsupported(
                "the 'ms' gate requires a numerical decomposition kernel and is not supported",
                span,
            ))
        }
        other => {
            return Err(Error::undefined(
                format!("unsupported / undeclared QASM operation: {other}"),
                span,
            ))
        }
    };
    Ok(out)
}

/// Invert a sequence of intrinsic applications: reverse the order and invert
/// each element.
pub fn invert_intrinsic_sequence(stmts: Vec<Stmt>, span: Span) -> Result<Vec<Stmt>> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts.into_iter().rev() {
        out.push(invert_intrinsic(stmt, span)?);
    }
    Ok(out)
}

fn negate_params(call: &GateCall, span: Span) -> Result<Vec<f64>> {
    call.params()
        .iter()
        .map(|p| match p {
            Expr::FloatLiteral(lit) => Ok(-lit.value()),
            Expr::IntLiteral(lit) => Ok(-(lit.value() as f64)),
            _ => Err(Error::unsupported(
                "cannot invert a gate with unevaluated parameters",
                span,
            )),
        })
        .collect()
}

fn invert_intrinsic(stmt: Stmt, span: Span) -> Result<Stmt> {
    match stmt {
        Stmt::GateCall(call) => {
            let name = call.name().to_string();
            let inverted = match name.as_str() {
                // self-inverse
                "id" | "h" | "x" | "y" | "z" | "cx" | "cz" | "cy" | "swap" | "ccx" => {
                    Stmt::GateCall(call)
                }
                "s" | "t" | "sdg" | "tdg" | "sx" | "sxdg" => {
                    let partner = match name.as_str() {
                        "s" => "sdg",
                        "sdg" => "s",
                        "t" => "tdg",
                        "tdg" => "t",
                        "sx" => "sxdg",
                        _ => "sx",
                    };
                    gate(
                        partner,
                        &call.qubits().iter().collect::<Vec<_>>(),
                    )
                }
                "rx" | "ry" | "rz" => {
                    let params = negate_params(&call, span)?;
                    GateCall::with_params(name, params, call.qubits().to_vec()).to_stmt()
                }
                // U(theta, phi, lam)^-1 = U(-theta, -lam, -phi)
                "U" => {
                    let params = negate_params(&call, span)?;
                    GateCall::with_params(
                        "U",
                        vec![params[0], params[2], params[1]],
                        call.qubits().to_vec(),
                    )
                    .to_stmt()
                }
                other => {
                    return Err(Error::unsupported(
                        format!("cannot invert non-intrinsic gate '{other}'"),
                        span,
                    ))
                }
            };
            Ok(inverted)
        }
        Stmt::GPhase(gp) => {
            let theta = match gp.arg() {
                Expr::FloatLiteral(lit) => -lit.value(),
                Expr::IntLiteral(lit) => -(lit.value() as f64),
                _ => {
                    return Err(Error::unsupported(
                        "cannot invert a global phase with an unevaluated argument",
                        span,
                    ))
                }
            };
            Ok(GPhase::new(
                Expr::float(theta),
                gp.qubits().to_vec(),
                Vec::new(),
                None,
            )
            .to_stmt())
        }
        other => Ok(other),
    }
}

//
// Controlled forms. `ctrl @` first walks the intrinsic control chain
// (x -> cx -> ccx, rz -> crz, ...); gates without a controlled form are
// decomposed and controlified element by element. Ancilla-free, the depth
// cost is accepted since this pass is not an optimizer.
//

fn direct_controlled_name(name: &str) -> Option<&'static str> {
    Some(match name {
        "x" => "cx",
        "y" => "cy",
        "z" => "cz",
        "rx" => "crx",
        "ry" => "cry",
        "rz" => "crz",
        "p" => "cp",
        "h" => "ch",
        "u3" | "U" => "cu3",
        "swap" => "cswap",
        "sx" => "csx",
        "cx" => "ccx",
        _ => return None,
    })
}

// Decomposition of intrinsics that have no direct controlled form, used to
// push a control through them.
fn control_fallback_body(call: &GateCall, span: Span) -> Result<Vec<Stmt>> {
    let q = |i: usize| &call.qubits()[i];
    let out = match call.name() {
        "s" => phaseshift(PI / 2.0, q(0)),
        "sdg" => phaseshift(-PI / 2.0, q(0)),
        "t" => phaseshift(PI / 4.0, q(0)),
        "tdg" => phaseshift(-PI / 4.0, q(0)),
        "sxdg" => vec![rot("rx", -PI / 2.0, q(0))],
        "cz" => vec![
            gate("h", &[q(1)]),
            gate("cx", &[q(0), q(1)]),
            gate("h", &[q(1)]),
        ],
        "cy" => vec![
            gate("sdg", &[q(1)]),
            gate("cx", &[q(0), q(1)]),
            gate("s", &[q(1)]),
        ],
        // standard Toffoli body
        "ccx" => vec![
            gate("h", &[q(2)]),
            gate("cx", &[q(1), q(2)]),
            gate("tdg", &[q(2)]),
            gate("cx", &[q(0), q(2)]),
            gate("t", &[q(2)]),
            gate("cx", &[q(1), q(2)]),
            gate("tdg", &[q(2)]),
            gate("cx", &[q(0), q(2)]),
            gate("t", &[q(1)]),
            gate("t", &[q(2)]),
            gate("h", &[q(2)]),
            gate("cx", &[q(0), q(1)]),
            gate("t", &[q(0)]),
            gate("tdg", &[q(1)]),
            gate("cx", &[q(0), q(1)]),
        ],
        other => {
            return Err(Error::unsupported(
                format!("gate '{other}' has no controlled form"),
                span,
            ))
        }
    };
    Ok(out)
}

/// Apply one control qubit to a sequence of intrinsic-tier statements,
/// producing intrinsic-tier statements again.
pub fn controlify(stmts: Vec<Stmt>, control: &GateOperand, span: Span) -> Result<Vec<Stmt>> {
    let mut out = Vec::new();
    for stmt in stmts {
        match stmt {
            Stmt::GateCall(call) => {
                if call.name() == "id" {
                    out.push(Stmt::GateCall(call));
                    continue;
                }
                if let Some(controlled) = direct_controlled_name(call.name()) {
                    let mut qubits = vec![control.clone()];
                    qubits.extend(call.qubits().iter().cloned());
                    let params = call
                        .params()
                        .iter()
                        .map(|p| match p {
                            Expr::FloatLiteral(lit) => Ok(lit.value()),
                            Expr::IntLiteral(lit) => Ok(lit.value() as f64),
                            _ => Err(Error::unsupported(
                                "cannot controlify a gate with unevaluated parameters",
                                span,
                            )),
                        })
                        .collect::<Result<Vec<f64>>>()?;
                    // The controlled form may itself be decomposable; expand
                    // it back down to intrinsics.
                    out.extend(expand(controlled, &params, &qubits, false, span)?);
                } else {
                    let body = control_fallback_body(&call, span)?;
                    out.extend(controlify(body, control, span)?);
                }
            }
            // A controlled global phase is a phase shift on the control.
            Stmt::GPhase(gp) => {
                let theta = match gp.arg() {
                    Expr::FloatLiteral(lit) => lit.value(),
                    Expr::IntLiteral(lit) => lit.value() as f64,
                    _ => {
                        return Err(Error::unsupported(
                            "cannot controlify a global phase with an unevaluated argument",
                            span,
                        ))
                    }
                };
                out.extend(phaseshift(theta, control));
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(name: &str, idx: usize) -> GateOperand {
        GateOperand::bit(name, idx)
    }

    #[test]
    fn test_intrinsic_passthrough() {
        let out = expand("h", &[], &[q("q", 0)], false, None).unwrap();
        assert_eq!(out.len(), 1);
        match &out[0] {
            Stmt::GateCall(call) => assert_eq!(call.name(), "h"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_u3_decomposes_to_rotations() {
        let out = expand("u3", &[0.1, 0.2, 0.3], &[q("q", 0)], false, None).unwrap();
        assert_eq!(out.len(), 5);
        let names: Vec<&str> = out
            .iter()
            .map(|s| match s {
                Stmt::GateCall(call) => call.name(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["rz", "rx", "rz", "rx", "rz"]);
    }

    #[test]
    fn test_inverse_of_s_is_sdg() {
        let out = expand("s", &[], &[q("q", 0)], true, None).unwrap();
        match &out[0] {
            Stmt::GateCall(call) => assert_eq!(call.name(), "sdg"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_inverse_reverses_recipe() {
        let forward = expand("u3", &[0.1, 0.2, 0.3], &[q("q", 0)], false, None).unwrap();
        let backward = expand("u3", &[0.1, 0.2, 0.3], &[q("q", 0)], true, None).unwrap();
        assert_eq!(forward.len(), backward.len());
        // first of the inverse mirrors the last of the forward, negated
        match (&forward[4], &backward[0]) {
            (Stmt::GateCall(f), Stmt::GateCall(b)) => {
                assert_eq!(f.name(), b.name());
                match (&f.params()[0], &b.params()[0]) {
                    (Expr::FloatLiteral(x), Expr::FloatLiteral(y)) => {
                        assert!((x.value() + y.value()).abs() < 1e-12)
                    }
                    _ => unreachable!(),
                }
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_controlify_x_gives_cx() {
        let base = expand("x", &[], &[q("q", 1)], false, None).unwrap();
        let out = controlify(base, &q("q", 0), None).unwrap();
        assert_eq!(out.len(), 1);
        match &out[0] {
            Stmt::GateCall(call) => {
                assert_eq!(call.name(), "cx");
                assert_eq!(call.qubits().len(), 2);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_controlify_cx_gives_ccx() {
        let base = expand("cx", &[], &[q("q", 1), q("q", 2)], false, None).unwrap();
        let out = controlify(base, &q("q", 0), None).unwrap();
        assert_eq!(out.len(), 1);
        match &out[0] {
            Stmt::GateCall(call) => assert_eq!(call.name(), "ccx"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_signature_lookup() {
        assert_eq!(signature("cx"), Some((2, 0)));
        assert_eq!(signature("cu"), Some((2, 4)));
        assert_eq!(signature("c4x"), Some((5, 0)));
        assert!(signature("nope").is_none());
    }

    #[test]
    fn test_everything_expands_to_intrinsics() {
        let cases: Vec<(&str, usize, usize)> = vec![
            ("u3", 1, 3),
            ("u2", 1, 2),
            ("p", 1, 1),
            ("ch", 2, 0),
            ("csx", 2, 0),
            ("crx", 2, 1),
            ("cry", 2, 1),
            ("crz", 2, 1),
            ("cp", 2, 1),
            ("cu3", 2, 3),
            ("cu", 2, 4),
            ("iswap", 2, 0),
            ("pswap", 2, 1),
            ("ecr", 2, 0),
            ("rxx", 2, 1),
            ("ryy", 2, 1),
            ("rzz", 2, 1),
            ("xx_plus_yy", 2, 2),
            ("cswap", 3, 0),
            ("rccx", 3, 0),
            ("c3sx", 4, 0),
            ("c4x", 5, 0),
        ];
        for (name, nq, np) in cases {
            let qubits: Vec<GateOperand> = (0..nq).map(|i| q("q", i)).collect();
            let params: Vec<f64> = (0..np).map(|i| 0.1 * (i + 1) as f64).collect();
            let out = expand(name, &params, &qubits, false, None).unwrap();
            for stmt in out {
                match stmt {
                    Stmt::GateCall(call) => {
                        assert!(is_intrinsic(call.name()), "{name} leaked {}", call.name())
                    }
                    Stmt::GPhase(_) => {}
                    other => unreachable!("unexpected statement {other:?}"),
                }
            }
        }
    }
}
