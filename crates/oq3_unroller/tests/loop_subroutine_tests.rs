// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

use oq3_unroller::ast::{Expr, Stmt};
use oq3_unroller::{loads, QasmModule, UnrollOptions};

fn unrolled(source: &str) -> QasmModule {
    let mut module = loads(source).expect("program should load");
    module.unroll().expect("program should unroll");
    module
}

fn gate_ops(module: &QasmModule) -> Vec<(String, Vec<(String, usize)>)> {
    module
        .unrolled_statements()
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::GateCall(call) => Some((
                call.name().to_string(),
                call.qubits()
                    .iter()
                    .map(|q| {
                        let (reg, idx) = q.resolved_bit().unwrap();
                        (reg.to_string(), idx)
                    })
                    .collect(),
            )),
            _ => None,
        })
        .collect()
}

#[test]
fn test_for_range_is_inclusive() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[4] q;
for int i in [0:3] {
    h q[i];
}
"#;
    let module = unrolled(qasm);
    let ops = gate_ops(&module);
    assert_eq!(ops.len(), 4);
    for (i, (name, qubits)) in ops.iter().enumerate() {
        assert_eq!(name, "h");
        assert_eq!(qubits[0], ("q".to_string(), i));
    }
}

#[test]
fn test_for_with_step_and_set() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[6] q;
for int i in [0:2:4] {
    h q[i];
}
for int j in {1, 5} {
    x q[j];
}
"#;
    let module = unrolled(qasm);
    let ops = gate_ops(&module);
    let touched: Vec<usize> = ops.iter().map(|(_, qubits)| qubits[0].1).collect();
    assert_eq!(touched, vec![0, 2, 4, 1, 5]);
}

#[test]
fn test_loop_iterator_is_read_only() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
for int i in [0:1] {
    i = 5;
}
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Type);
}

#[test]
fn test_while_unrolls_with_counter() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[3] q;
int[32] i = 0;
while (i < 3) {
    h q[i];
    i += 1;
}
"#;
    let module = unrolled(qasm);
    let ops = gate_ops(&module);
    assert_eq!(ops.len(), 3);
    let touched: Vec<usize> = ops.iter().map(|(_, qubits)| qubits[0].1).collect();
    assert_eq!(touched, vec![0, 1, 2]);
}

#[test]
fn test_while_on_measurement_bit_rejected() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
bit[1] c;
c[0] = measure q[0];
while (c[0] == 1) {
    x q[0];
}
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Unsupported);
}

#[test]
fn test_loop_iteration_limit() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
int[32] i = 0;
while (i < 100) {
    h q[0];
    i += 1;
}
"#;
    let mut module = loads(qasm).unwrap();
    let options = UnrollOptions {
        max_loop_iters: 10,
        ..Default::default()
    };
    let err = module.unroll_with(options).unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Range);
}

#[test]
fn test_subroutine_with_qubit_argument() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
def bell(qubit[2] r) {
    h r[0];
    cx r[0], r[1];
}
qubit[2] q;
bell(q);
"#;
    let module = unrolled(qasm);
    let ops = gate_ops(&module);
    assert_eq!(
        ops,
        vec![
            ("h".to_string(), vec![("q".to_string(), 0)]),
            (
                "cx".to_string(),
                vec![("q".to_string(), 0), ("q".to_string(), 1)]
            ),
        ]
    );
}

#[test]
fn test_subroutine_return_value_in_expression() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
def doubled(int[32] x) -> int[32] {
    return x * 2;
}
qubit[1] q;
rz(doubled(2)) q[0];
"#;
    let module = unrolled(qasm);
    let ops = gate_ops(&module);
    assert_eq!(ops.len(), 1);
    match &module.unrolled_statements()[module.unrolled_statements().len() - 1] {
        Stmt::GateCall(call) => match &call.params()[0] {
            Expr::FloatLiteral(lit) => assert_eq!(lit.value(), 4.0),
            other => unreachable!("unexpected parameter {other:?}"),
        },
        other => unreachable!("unexpected statement {other:?}"),
    }
}

#[test]
fn test_subroutine_emits_gates_and_returns() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
def flip(qubit[1] r, int[32] n) -> int[32] {
    x r[0];
    return n + 1;
}
qubit[1] q;
int[32] m = flip(q, 1);
"#;
    let module = unrolled(qasm);
    let ops = gate_ops(&module);
    assert_eq!(ops, vec![("x".to_string(), vec![("q".to_string(), 0)])]);
}

#[test]
fn test_subroutine_argument_count_checked() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
def bell(qubit[2] r) {
    h r[0];
}
qubit[2] q;
bell(q, 1);
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Arity);
}

#[test]
fn test_subroutine_qubit_size_mismatch() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
def bell(qubit[2] r) {
    h r[0];
}
qubit[3] q;
bell(q);
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Arity);
}

#[test]
fn test_duplicate_qubits_across_arguments_rejected() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
def pair(qubit[1] a, qubit[1] b) {
    cx a[0], b[0];
}
qubit[2] q;
pair(q[0], q[0]);
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Duplicate);
}

#[test]
fn test_undefined_subroutine_rejected() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
nothing(q);
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Undefined);
}

#[test]
fn test_nested_subroutine_calls() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
def inner(qubit[1] r) {
    x r[0];
}
def outer(qubit[2] s) {
    inner(s[0]);
    inner(s[1]);
}
qubit[2] q;
outer(q);
"#;
    let module = unrolled(qasm);
    let ops = gate_ops(&module);
    assert_eq!(
        ops,
        vec![
            ("x".to_string(), vec![("q".to_string(), 0)]),
            ("x".to_string(), vec![("q".to_string(), 1)]),
        ]
    );
}
