// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

use oq3_unroller::ast::{Expr, Stmt};
use oq3_unroller::{loads, QasmModule};

fn unrolled(source: &str) -> QasmModule {
    let mut module = loads(source).expect("program should load");
    module.unroll().expect("program should unroll");
    module
}

fn gate_names(module: &QasmModule) -> Vec<String> {
    module
        .unrolled_statements()
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::GateCall(call) => Some(call.name().to_string()),
            _ => None,
        })
        .collect()
}

fn operand_text(stmt: &Stmt) -> String {
    match stmt {
        Stmt::GateCall(call) => call
            .qubits()
            .iter()
            .map(|q| {
                let (reg, idx) = q.resolved_bit().unwrap();
                format!("{reg}[{idx}]")
            })
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    }
}

#[test]
fn test_deutsch_jozsa_unroll() {
    // the four-qubit oracle-H-cx-H-measure chain
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[4] q;
qubit[1] ancilla;
bit[4] c;

x ancilla[0];
for int i in [0:3] {
    h q[i];
}
h ancilla[0];
for int i in [0:3] {
    cx q[i], ancilla[0];
}
for int i in [0:3] {
    h q[i];
}
c = measure q;
"#;
    let module = unrolled(qasm);
    let names = gate_names(&module);
    let mut expected = vec!["x".to_string()];
    expected.extend(std::iter::repeat("h".to_string()).take(4));
    expected.push("h".to_string());
    expected.extend(std::iter::repeat("cx".to_string()).take(4));
    expected.extend(std::iter::repeat("h".to_string()).take(4));
    assert_eq!(names, expected);

    let measurements: Vec<&Stmt> = module
        .unrolled_statements()
        .iter()
        .filter(|s| matches!(s, Stmt::Measurement(..)))
        .collect();
    assert_eq!(measurements.len(), 4);
    for (i, stmt) in measurements.iter().enumerate() {
        match stmt {
            Stmt::Measurement(m) => {
                assert_eq!(m.qubit().resolved_bit(), Some(("q", i)));
                let target = m.target().unwrap();
                assert_eq!(target.name(), "c");
            }
            _ => unreachable!(),
        }
    }

    let cx_ops: Vec<String> = module
        .unrolled_statements()
        .iter()
        .filter(|s| matches!(s, Stmt::GateCall(call) if call.name() == "cx"))
        .map(operand_text)
        .collect();
    assert_eq!(
        cx_ops,
        vec![
            "q[0],ancilla[0]",
            "q[1],ancilla[0]",
            "q[2],ancilla[0]",
            "q[3],ancilla[0]"
        ]
    );
}

#[test]
fn test_broadcast_with_repeated_operand_pairs() {
    // four single-qubit operands chunk into two applications
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[3] q;
cx q[0], q[1], q[1], q[2];
"#;
    let module = unrolled(qasm);
    let cx_ops: Vec<String> = module
        .unrolled_statements()
        .iter()
        .filter(|s| matches!(s, Stmt::GateCall(call) if call.name() == "cx"))
        .map(operand_text)
        .collect();
    assert_eq!(cx_ops, vec!["q[0],q[1]", "q[1],q[2]"]);
}

#[test]
fn test_duplicate_qubit_rejected() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[3] q;
cx q[1], q[1];
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Duplicate);
}

#[test]
fn test_register_broadcast_zips_positionally() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] a;
qubit[2] b;
cx a, b;
"#;
    let module = unrolled(qasm);
    let cx_ops: Vec<String> = module
        .unrolled_statements()
        .iter()
        .filter(|s| matches!(s, Stmt::GateCall(_)))
        .map(operand_text)
        .collect();
    assert_eq!(cx_ops, vec!["a[0],b[0]", "a[1],b[1]"]);
}

#[test]
fn test_slice_broadcast() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[4] q;
h q[0:2];
"#;
    let module = unrolled(qasm);
    let ops: Vec<String> = module
        .unrolled_statements()
        .iter()
        .filter(|s| matches!(s, Stmt::GateCall(_)))
        .map(operand_text)
        .collect();
    // half-open slice [0, 2)
    assert_eq!(ops, vec!["q[0]", "q[1]"]);
}

#[test]
fn test_unknown_gate_rejected() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
mystery q[0];
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Undefined);
}

#[test]
fn test_unroll_is_idempotent() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
bit[2] c;
h q[0];
cx q[0], q[1];
c = measure q;
"#;
    let mut module = loads(qasm).unwrap();
    module.unroll().unwrap();
    let first = oq3_unroller::dumps(&module);

    let mut reloaded = loads(&first).unwrap();
    reloaded.unroll().unwrap();
    let second = oq3_unroller::dumps(&reloaded);
    assert_eq!(first, second);
}

#[test]
fn test_output_is_intrinsic_only() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[3] q;
u3(0.1, 0.2, 0.3) q[0];
ch q[0], q[1];
cswap q[0], q[1], q[2];
rxx(0.5) q[0], q[1];
iswap q[1], q[2];
crx(1.2) q[0], q[2];
"#;
    let module = unrolled(qasm);
    for stmt in module.unrolled_statements() {
        if let Stmt::GateCall(call) = stmt {
            assert!(
                oq3_unroller::gates::is_intrinsic(call.name()),
                "non-intrinsic gate '{}' in unrolled output",
                call.name()
            );
        }
    }
}

#[test]
fn test_physical_qubits_consolidated() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
h $2;
cx $2, $0;
"#;
    let module = unrolled(qasm);
    // first statement declares the device register sized by first use
    match &module.unrolled_statements()[0] {
        Stmt::QuantumDeclaration(decl) => {
            assert_eq!(decl.name(), "__qubits__");
            assert_eq!(decl.size(), Some(&Expr::int(2)));
        }
        other => unreachable!("expected device register declaration, found {other:?}"),
    }
    let ops: Vec<String> = module
        .unrolled_statements()
        .iter()
        .filter(|s| matches!(s, Stmt::GateCall(_)))
        .map(operand_text)
        .collect();
    assert_eq!(ops, vec!["__qubits__[0]", "__qubits__[0],__qubits__[1]"]);
}

#[test]
fn test_check_only_validation_emits_nothing() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
h q[0];
"#;
    let mut module = loads(qasm).unwrap();
    module.validate().unwrap();
    assert!(module.unrolled_statements().is_empty());
    assert_eq!(module.num_qubits().unwrap(), 2);
}

#[test]
fn test_crlf_rejected() {
    let qasm = "OPENQASM 3.0;\r\nqubit q;\r\n";
    let err = loads(qasm).unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Syntax);
}
