// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

use oq3_unroller::ast::Stmt;
use oq3_unroller::{dumps, loads, BasisSet, QasmModule};

fn unrolled(source: &str) -> QasmModule {
    let mut module = loads(source).expect("program should load");
    module.unroll().expect("program should unroll");
    module
}

fn gate_ops(module: &QasmModule) -> Vec<(String, Vec<usize>)> {
    module
        .unrolled_statements()
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::GateCall(call) => Some((
                call.name().to_string(),
                call.qubits()
                    .iter()
                    .map(|q| q.resolved_bit().unwrap().1)
                    .collect(),
            )),
            _ => None,
        })
        .collect()
}

#[test]
fn test_counts() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[3] q;
qubit[2] r;
bit[4] c;
"#;
    let mut module = loads(qasm).unwrap();
    assert_eq!(module.num_qubits().unwrap(), 5);
    assert_eq!(module.num_clbits().unwrap(), 4);
}

#[test]
fn test_depth_linear_chain() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
h q[0];
h q[0];
cx q[0], q[1];
"#;
    let mut module = loads(qasm).unwrap();
    assert_eq!(module.depth().unwrap(), 3);
}

#[test]
fn test_depth_parallel_gates() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
h q[0];
h q[1];
"#;
    let mut module = loads(qasm).unwrap();
    assert_eq!(module.depth().unwrap(), 1);
}

#[test]
fn test_depth_with_measurement() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
bit[1] c;
h q[0];
c[0] = measure q[0];
"#;
    let mut module = loads(qasm).unwrap();
    assert_eq!(module.depth().unwrap(), 2);
}

#[test]
fn test_depth_branch_counts_once() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
bit[1] c;
if (c[0]) {
    x q[0];
    x q[0];
    x q[0];
}
"#;
    let mut module = loads(qasm).unwrap();
    assert_eq!(module.depth().unwrap(), 1);
}

#[test]
fn test_has_and_remove_measurements() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
bit[1] c;
h q[0];
c[0] = measure q[0];
"#;
    let mut module = unrolled(qasm);
    assert!(module.has_measurements());
    module.remove_measurements();
    assert!(!module.has_measurements());
    assert!(!module
        .unrolled_statements()
        .iter()
        .any(|s| matches!(s, Stmt::Measurement(..))));
}

#[test]
fn test_has_and_remove_barriers() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
h q[0];
barrier q;
h q[1];
"#;
    let mut module = unrolled(qasm);
    assert!(module.has_barriers());
    module.remove_barriers();
    assert!(!module.has_barriers());
}

#[test]
fn test_barriers_split_per_qubit() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[3] q;
barrier q;
"#;
    let module = unrolled(qasm);
    let barriers: Vec<&Stmt> = module
        .unrolled_statements()
        .iter()
        .filter(|s| matches!(s, Stmt::Barrier(..)))
        .collect();
    assert_eq!(barriers.len(), 3);
}

#[test]
fn test_remove_includes() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
h q[0];
"#;
    let mut module = unrolled(qasm);
    assert!(module
        .unrolled_statements()
        .iter()
        .any(|s| matches!(s, Stmt::Include(..))));
    module.remove_includes();
    assert!(!module
        .unrolled_statements()
        .iter()
        .any(|s| matches!(s, Stmt::Include(..))));
}

#[test]
fn test_remove_idle_qubits_shrinks_register() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[4] q;
h q[1];
cx q[1], q[3];
"#;
    let mut module = loads(qasm).unwrap();
    module.remove_idle_qubits().unwrap();
    assert_eq!(module.num_qubits().unwrap(), 2);
    // surviving qubits renumber stably: q[1] -> q[0], q[3] -> q[1]
    let ops = gate_ops(&module);
    assert_eq!(
        ops,
        vec![("h".to_string(), vec![0]), ("cx".to_string(), vec![0, 1])]
    );
    match module
        .unrolled_statements()
        .iter()
        .find(|s| matches!(s, Stmt::QuantumDeclaration(..)))
        .unwrap()
    {
        Stmt::QuantumDeclaration(decl) => {
            assert_eq!(decl.size(), Some(&oq3_unroller::ast::Expr::int(2)));
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_remove_fully_idle_register() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
qubit[2] spare;
h q[0];
h q[1];
"#;
    let mut module = loads(qasm).unwrap();
    module.remove_idle_qubits().unwrap();
    assert_eq!(module.num_qubits().unwrap(), 2);
    let decl_names: Vec<&str> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::QuantumDeclaration(decl) => Some(decl.name()),
            _ => None,
        })
        .collect();
    assert_eq!(decl_names, vec!["q"]);
}

#[test]
fn test_populate_idle_qubits_adds_identity() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[3] q;
h q[0];
"#;
    let mut module = loads(qasm).unwrap();
    module.populate_idle_qubits().unwrap();
    let text = dumps(&module);
    assert!(text.contains("id q[1];"));
    assert!(text.contains("id q[2];"));
}

#[test]
fn test_reverse_qubit_order() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[3] q;
h q[0];
cx q[0], q[2];
"#;
    let mut module = loads(qasm).unwrap();
    module.reverse_qubit_order().unwrap();
    let ops = gate_ops(&module);
    assert_eq!(
        ops,
        vec![("h".to_string(), vec![2]), ("cx".to_string(), vec![2, 0])]
    );
}

#[test]
fn test_double_reversal_is_identity() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[3] q;
h q[0];
cx q[0], q[2];
"#;
    let mut module = loads(qasm).unwrap();
    module.unroll().unwrap();
    let baseline = dumps(&module);
    module.reverse_qubit_order().unwrap();
    module.reverse_qubit_order().unwrap();
    assert_eq!(dumps(&module), baseline);
}

#[test]
fn test_compare_equivalent_programs() {
    let direct = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
h q[0];
cx q[0], q[1];
"#;
    let via_gate = r#"
OPENQASM 3.0;
include "stdgates.inc";
gate bellpair a, b {
    h a;
    cx a, b;
}
qubit[2] q;
bellpair q[0], q[1];
"#;
    let mut left = loads(direct).unwrap();
    let mut right = loads(via_gate).unwrap();
    let report = left.compare(&mut right).unwrap();
    assert!(report.is_equivalent, "differences: {:?}", report.differences);
}

#[test]
fn test_compare_detects_differences() {
    let one = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
h q[0];
"#;
    let two = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
h q[0];
h q[1];
"#;
    let mut left = loads(one).unwrap();
    let mut right = loads(two).unwrap();
    let report = left.compare(&mut right).unwrap();
    assert!(!report.is_equivalent);
    assert!(!report.differences.is_empty());
}

#[test]
fn test_rebase_h_to_rotational() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
h q[0];
"#;
    let mut module = loads(qasm).unwrap();
    module.rebase(BasisSet::RotationalCx).unwrap();
    let ops: Vec<String> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::GateCall(call) => Some(format!(
                "{}{}",
                call.name(),
                call.params()
                    .first()
                    .map(|p| format!("({})", oq3_unroller::printer::expr(p)))
                    .unwrap_or_default()
            )),
            _ => None,
        })
        .collect();
    assert_eq!(
        ops,
        vec![
            "ry(1.5707963267948966)".to_string(),
            "rx(3.141592653589793)".to_string()
        ]
    );
}

#[test]
fn test_rebase_clifford_t_rejects_rotation() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
rx(0.3) q[0];
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.rebase(BasisSet::CliffordT).unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Rebase);
}

#[test]
fn test_rebase_parameterized_passes_in_rotational() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
rx(0.3) q[0];
"#;
    let mut module = loads(qasm).unwrap();
    module.rebase(BasisSet::RotationalCx).unwrap();
    let names: Vec<&str> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::GateCall(call) => Some(call.name()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["rx"]);
}

#[test]
fn test_dumps_exact_text() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
bit[2] c;
h q[0];
cx q[0], q[1];
c = measure q;
"#;
    let module = unrolled(qasm);
    let expected = "OPENQASM 3.0;\n\
                    include \"stdgates.inc\";\n\
                    qubit[2] q;\n\
                    bit[2] c;\n\
                    h q[0];\n\
                    cx q[0], q[1];\n\
                    c[0] = measure q[0];\n\
                    c[1] = measure q[1];\n";
    assert_eq!(dumps(&module), expected);
}
