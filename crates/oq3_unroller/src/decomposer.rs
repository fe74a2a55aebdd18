// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Rebase of an unrolled program onto a target basis set by recursive
// lookup decomposition. This is not an approximation pass: a rotation gate
// that the target basis cannot express exactly is an error.

use crate::ast::{Branch, Expr, GateCall, GateOperand, Span, Stmt};
use crate::error::{Error, Result};
use crate::gates::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasisSet {
    /// The stdgates.inc working set.
    Default,
    /// {rx, ry, rz, cx}
    RotationalCx,
    /// {h, s, t, sdg, tdg, cx}
    CliffordT,
}

fn in_basis(basis: BasisSet, name: &str) -> bool {
    match basis {
        BasisSet::Default => matches!(
            name,
            "id" | "rx"
                | "ry"
                | "rz"
                | "h"
                | "x"
                | "y"
                | "z"
                | "s"
                | "sx"
                | "t"
                | "sdg"
                | "tdg"
                | "cx"
                | "cz"
                | "swap"
        ),
        BasisSet::RotationalCx => matches!(name, "rx" | "ry" | "rz" | "cx"),
        BasisSet::CliffordT => matches!(name, "h" | "s" | "t" | "sdg" | "tdg" | "cx"),
    }
}

enum Step {
    Gate(&'static str, usize),
    Rot(&'static str, f64, usize),
    // control bit, target bit
    Cx(usize, usize),
}

fn rule(basis: BasisSet, name: &str) -> Option<Vec<Step>> {
    use Step::*;
    let steps = match basis {
        BasisSet::RotationalCx => match name {
            "x" => vec![Rot("rx", PI, 0)],
            "y" => vec![Rot("ry", PI, 0)],
            "z" => vec![Rot("rz", PI, 0)],
            "h" => vec![Rot("ry", PI / 2.0, 0), Rot("rx", PI, 0)],
            "s" => vec![Rot("rz", PI / 2.0, 0)],
            "t" => vec![Rot("rz", PI / 4.0, 0)],
            "sx" => vec![Rot("rx", PI / 2.0, 0)],
            "sxdg" => vec![Rot("rx", -PI / 2.0, 0)],
            "sdg" => vec![Rot("rz", -PI / 2.0, 0)],
            "tdg" => vec![Rot("rz", -PI / 4.0, 0)],
            "cz" => vec![
                Rot("ry", PI / 2.0, 1),
                Rot("rx", PI, 1),
                Cx(0, 1),
                Rot("ry", PI / 2.0, 1),
                Rot("rx", PI, 1),
            ],
            "swap" => vec![Cx(0, 1), Cx(1, 0), Cx(0, 1)],
            _ => return None,
        },
        BasisSet::CliffordT => match name {
            "x" => vec![Gate("h", 0), Gate("s", 0), Gate("s", 0), Gate("h", 0)],
            "y" => vec![
                Gate("s", 0),
                Gate("s", 0),
                Gate("h", 0),
                Gate("s", 0),
                Gate("s", 0),
                Gate("h", 0),
            ],
            "z" => vec![Gate("s", 0), Gate("s", 0)],
            "sx" => vec![
                Gate("s", 0),
                Gate("s", 0),
                Gate("s", 0),
                Gate("h", 0),
                Gate("s", 0),
                Gate("s", 0),
                Gate("s", 0),
            ],
            "sxdg" => vec![
                Gate("sdg", 0),
                Gate("sdg", 0),
                Gate("sdg", 0),
                Gate("h", 0),
                Gate("sdg", 0),
                Gate("sdg", 0),
                Gate("sdg", 0),
            ],
            "cz" => vec![Gate("h", 1), Cx(0, 1), Gate("h", 1)],
            "swap" => vec![Cx(0, 1), Cx(1, 0), Cx(0, 1)],
            _ => return None,
        },
        // The default basis needs rules only for the intrinsics outside
        // stdgates' working set.
        BasisSet::Default => match name {
            "sxdg" => vec![Rot("rx", -PI / 2.0, 0)],
            _ => return None,
        },
    };
    Some(steps)
}

// Shared recipes for intrinsics with no direct rule in any basis; the
// output is processed recursively.
fn common_rule(name: &str) -> Option<Vec<Step>> {
    use Step::*;
    let steps = match name {
        "cy" => vec![Gate("sdg", 1), Cx(0, 1), Gate("s", 1)],
        "ccx" => vec![
            Gate("h", 2),
            Cx(1, 2),
            Gate("tdg", 2),
            Cx(0, 2),
            Gate("t", 2),
            Cx(1, 2),
            Gate("tdg", 2),
            Cx(0, 2),
            Gate("t", 1),
            Gate("t", 2),
            Gate("h", 2),
            Cx(0, 1),
            Gate("t", 0),
            Gate("tdg", 1),
            Cx(0, 1),
        ],
        _ => return None,
    };
    Some(steps)
}

fn apply_steps(steps: Vec<Step>, qubits: &[GateOperand]) -> Vec<Stmt> {
    steps
        .into_iter()
        .map(|step| match step {
            Step::Gate(name, target) => {
                GateCall::basic(name, vec![qubits[target].clone()]).to_stmt()
            }
            Step::Rot(name, angle, target) => {
                GateCall::with_params(name, vec![angle], vec![qubits[target].clone()]).to_stmt()
            }
            Step::Cx(control, target) => GateCall::basic(
                "cx",
                vec![qubits[control].clone(), qubits[target].clone()],
            )
            .to_stmt(),
        })
        .collect()
}

fn gate_params(call: &GateCall, span: Span) -> Result<Vec<f64>> {
    call.params()
        .iter()
        .map(|p| match p {
            Expr::FloatLiteral(lit) => Ok(lit.value()),
            Expr::IntLiteral(lit) => Ok(lit.value() as f64),
            _ => Err(Error::rebase(
                "cannot rebase a gate with unevaluated parameters",
                span,
            )),
        })
        .collect()
}

fn process_gate(call: &GateCall, basis: BasisSet, out: &mut Vec<Stmt>) -> Result<()> {
    let name = call.name();
    let span = call.span;
    if in_basis(basis, name) {
        out.push(Stmt::GateCall(call.clone()));
        return Ok(());
    }
    if name == "id" {
        // the identity contributes nothing outside the default basis
        return Ok(());
    }
    if let Some(steps) = rule(basis, name).or_else(|| common_rule(name)) {
        for stmt in apply_steps(steps, call.qubits()) {
            process_stmt(&stmt, basis, out)?;
        }
        return Ok(());
    }
    // `U` reduces to rotations; rotations themselves are native to the
    // rotational basis and unsupported in Clifford+T (no approximation).
    match name {
        "U" if basis != BasisSet::CliffordT => {
            let params = gate_params(call, span)?;
            for stmt in crate::gates::expand("u3", &params, call.qubits(), false, span)? {
                process_stmt(&stmt, basis, out)?;
            }
            Ok(())
        }
        _ => Err(Error::rebase(
            format!("gate '{name}' is not supported in the target basis set"),
            span,
        )),
    }
}

fn process_stmt(stmt: &Stmt, basis: BasisSet, out: &mut Vec<Stmt>) -> Result<()> {
    match stmt {
        Stmt::GateCall(call) => process_gate(call, basis, out),
        Stmt::Branch(branch) => {
            let mut if_block = Vec::new();
            for inner in branch.if_block() {
                process_stmt(inner, basis, &mut if_block)?;
            }
            let mut else_block = Vec::new();
            for inner in branch.else_block() {
                process_stmt(inner, basis, &mut else_block)?;
            }
            out.push(
                Branch::new(branch.condition().clone(), if_block, else_block, branch.span)
                    .to_stmt(),
            );
            Ok(())
        }
        other => {
            out.push(other.clone());
            Ok(())
        }
    }
}

/// Rewrite an unrolled statement list onto the target basis.
pub(crate) fn rebase_statements(statements: &[Stmt], basis: BasisSet) -> Result<Vec<Stmt>> {
    let mut out = Vec::new();
    for stmt in statements {
        process_stmt(stmt, basis, &mut out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_h_rebases_to_rotations() {
        let stmts = vec![GateCall::basic("h", vec![GateOperand::bit("q", 0)]).to_stmt()];
        let out = rebase_statements(&stmts, BasisSet::RotationalCx).unwrap();
        assert_eq!(out.len(), 2);
        match (&out[0], &out[1]) {
            (Stmt::GateCall(a), Stmt::GateCall(b)) => {
                assert_eq!(a.name(), "ry");
                assert_eq!(b.name(), "rx");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_rotation_passes_in_rotational_basis() {
        let stmts =
            vec![GateCall::with_params("rx", vec![0.3], vec![GateOperand::bit("q", 0)]).to_stmt()];
        let out = rebase_statements(&stmts, BasisSet::RotationalCx).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_rotation_fails_in_clifford_t() {
        let stmts =
            vec![GateCall::with_params("rx", vec![0.3], vec![GateOperand::bit("q", 0)]).to_stmt()];
        let err = rebase_statements(&stmts, BasisSet::CliffordT).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Rebase);
    }

    #[test]
    fn test_ccx_rebases_everywhere() {
        let qubits = vec![
            GateOperand::bit("q", 0),
            GateOperand::bit("q", 1),
            GateOperand::bit("q", 2),
        ];
        let stmts = vec![GateCall::basic("ccx", qubits).to_stmt()];
        for basis in [BasisSet::Default, BasisSet::RotationalCx, BasisSet::CliffordT] {
            let out = rebase_statements(&stmts, basis).unwrap();
            for stmt in &out {
                match stmt {
                    Stmt::GateCall(call) => assert!(in_basis(basis, call.name())),
                    _ => unreachable!(),
                }
            }
        }
    }
}
