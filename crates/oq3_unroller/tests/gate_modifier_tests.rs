// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

use oq3_unroller::ast::{Expr, Stmt};
use oq3_unroller::{loads, QasmModule, UnrollOptions};

fn unrolled(source: &str) -> QasmModule {
    let mut module = loads(source).expect("program should load");
    module.unroll().expect("program should unroll");
    module
}

fn gate_calls(module: &QasmModule) -> Vec<&oq3_unroller::ast::GateCall> {
    module
        .unrolled_statements()
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::GateCall(call) => Some(call),
            _ => None,
        })
        .collect()
}

fn first_param(call: &oq3_unroller::ast::GateCall) -> f64 {
    match &call.params()[0] {
        Expr::FloatLiteral(lit) => lit.value(),
        Expr::IntLiteral(lit) => lit.value() as f64,
        other => unreachable!("unexpected parameter {other:?}"),
    }
}

#[test]
fn test_ctrl_x_becomes_cx() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
ctrl @ x q[0], q[1];
"#;
    let module = unrolled(qasm);
    let calls = gate_calls(&module);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name(), "cx");
    assert_eq!(calls[0].qubits()[0].resolved_bit(), Some(("q", 0)));
    assert_eq!(calls[0].qubits()[1].resolved_bit(), Some(("q", 1)));
}

#[test]
fn test_ctrl2_x_becomes_ccx() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[3] q;
ctrl(2) @ x q[0], q[1], q[2];
"#;
    let module = unrolled(qasm);
    let calls = gate_calls(&module);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name(), "ccx");
    let operands: Vec<_> = calls[0]
        .qubits()
        .iter()
        .map(|q| q.resolved_bit().unwrap())
        .collect();
    assert_eq!(operands, vec![("q", 0), ("q", 1), ("q", 2)]);
}

#[test]
fn test_ctrl_rz_becomes_crz_expansion() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
ctrl @ rz(0.5) q[0], q[1];
"#;
    let module = unrolled(qasm);
    // crz has no intrinsic form; it decomposes to rotations and cx
    for call in gate_calls(&module) {
        assert!(matches!(call.name(), "rz" | "rx" | "cx"));
    }
    assert!(gate_calls(&module).iter().any(|c| c.name() == "cx"));
}

#[test]
fn test_negctrl_wraps_with_x() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
negctrl @ x q[0], q[1];
"#;
    let module = unrolled(qasm);
    let names: Vec<&str> = gate_calls(&module).iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["x", "cx", "x"]);
}

#[test]
fn test_inv_of_s_is_sdg() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
inv @ s q[0];
inv @ tdg q[0];
inv @ h q[0];
"#;
    let module = unrolled(qasm);
    let names: Vec<&str> = gate_calls(&module).iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["sdg", "t", "h"]);
}

#[test]
fn test_inv_negates_rotation() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
inv @ rx(0.5) q[0];
"#;
    let module = unrolled(qasm);
    let calls = gate_calls(&module);
    assert_eq!(calls[0].name(), "rx");
    assert_eq!(first_param(calls[0]), -0.5);
}

#[test]
fn test_integer_pow_repeats() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
pow(3) @ h q[0];
"#;
    let module = unrolled(qasm);
    let names: Vec<&str> = gate_calls(&module).iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["h", "h", "h"]);
}

#[test]
fn test_negative_pow_inverts() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
pow(-2) @ s q[0];
"#;
    let module = unrolled(qasm);
    let names: Vec<&str> = gate_calls(&module).iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["sdg", "sdg"]);
}

#[test]
fn test_fractional_pow_scales_rotation() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
pow(0.5) @ rx(pi) q[0];
"#;
    let module = unrolled(qasm);
    let calls = gate_calls(&module);
    assert_eq!(calls.len(), 1);
    assert!((first_param(calls[0]) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
}

#[test]
fn test_fractional_pow_rejected_for_non_rotation() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
pow(0.5) @ h q[0];
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Unsupported);
}

#[test]
fn test_custom_gate_expansion() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
gate majority a, b, c {
    cx c, b;
    cx c, a;
    ccx a, b, c;
}
qubit[3] q;
majority q[0], q[1], q[2];
"#;
    let module = unrolled(qasm);
    let names: Vec<&str> = gate_calls(&module).iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["cx", "cx", "ccx"]);
    let first = gate_calls(&module)[0];
    assert_eq!(first.qubits()[0].resolved_bit(), Some(("q", 2)));
    assert_eq!(first.qubits()[1].resolved_bit(), Some(("q", 1)));
}

#[test]
fn test_custom_gate_with_params() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
gate twist(a) p {
    rz(a) p;
    rx(a / 2) p;
}
qubit[1] q;
twist(pi) q[0];
"#;
    let module = unrolled(qasm);
    let calls = gate_calls(&module);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].name(), "rz");
    assert!((first_param(calls[0]) - std::f64::consts::PI).abs() < 1e-12);
    assert_eq!(calls[1].name(), "rx");
    assert!((first_param(calls[1]) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
}

#[test]
fn test_inverse_custom_gate_reverses_body() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
gate twist(a) p {
    rz(a) p;
    rx(a / 2) p;
}
qubit[1] q;
inv @ twist(pi) q[0];
"#;
    let module = unrolled(qasm);
    let calls = gate_calls(&module);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].name(), "rx");
    assert!((first_param(calls[0]) + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    assert_eq!(calls[1].name(), "rz");
    assert!((first_param(calls[1]) + std::f64::consts::PI).abs() < 1e-12);
}

#[test]
fn test_recursive_gate_rejected() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
gate loop_gate p {
    loop_gate p;
}
qubit[1] q;
loop_gate q[0];
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Unsupported);
}

#[test]
fn test_gate_parameter_arity_checked() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
rx(0.1, 0.2) q[0];
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Arity);
}

#[test]
fn test_external_gates_are_retained() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
rxx(0.5) q[0], q[1];
"#;
    let mut module = loads(qasm).unwrap();
    let options = UnrollOptions {
        external_gates: vec!["rxx".to_string()],
        ..Default::default()
    };
    module.unroll_with(options).unwrap();
    let calls = gate_calls(&module);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name(), "rxx");
    assert!((first_param(calls[0]) - 0.5).abs() < 1e-12);
}

#[test]
fn test_gate_aliases_normalize() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
cnot q[0], q[1];
not q[0];
"#;
    let module = unrolled(qasm);
    let names: Vec<&str> = gate_calls(&module).iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["cx", "x"]);
}
