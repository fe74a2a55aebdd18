// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

use oq3_unroller::ast::Stmt;
use oq3_unroller::{dumps, loads, Flavor, QasmModule};

fn unrolled(source: &str) -> QasmModule {
    let mut module = loads(source).expect("program should load");
    module.unroll().expect("program should unroll");
    module
}

#[test]
fn test_qasm2_loads_and_unrolls() {
    let qasm = r#"OPENQASM 2.0;
include "qelib1.inc";
qreg q[2];
creg c[2];
h q[0];
cx q[0],q[1];
measure q[0] -> c[0];
measure q[1] -> c[1];
"#;
    let mut module = loads(qasm).unwrap();
    assert_eq!(module.flavor(), Flavor::Qasm2);
    module.unroll().unwrap();
    assert_eq!(module.num_qubits().unwrap(), 2);
    let text = dumps(&module);
    // the QASM2 flavor prints old-style declarations and measurements
    assert!(text.starts_with("OPENQASM 2.0;"));
    assert!(text.contains("qreg q[2];"));
    assert!(text.contains("creg c[2];"));
    assert!(text.contains("measure q[0] -> c[0];"));
}

#[test]
fn test_qasm2_to_qasm3() {
    let qasm = r#"OPENQASM 2.0;
include "qelib1.inc";
qreg q[1];
h q[0];
"#;
    let module = loads(qasm).unwrap();
    let mut converted = module.to_qasm3().unwrap();
    assert_eq!(converted.flavor(), Flavor::Qasm3);
    converted.unroll().unwrap();
    let text = dumps(&converted);
    assert!(text.starts_with("OPENQASM 3.0;"));
    assert!(text.contains("qubit[1] q;"));
    assert!(text.contains("include \"stdgates.inc\";"));
}

#[test]
fn test_to_qasm3_rejected_for_qasm3_input() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
"#;
    let module = loads(qasm).unwrap();
    assert!(module.to_qasm3().is_err());
}

#[test]
fn test_unsupported_version_rejected() {
    let err = loads("OPENQASM 4.0;\nqubit q;\n").unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Syntax);
}

#[test]
fn test_alias_resolution() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[4] q;
let a = q[1:3];
x a[0];
x a[1];
"#;
    let module = unrolled(qasm);
    let touched: Vec<usize> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::GateCall(call) => Some(call.qubits()[0].resolved_bit().unwrap().1),
            _ => None,
        })
        .collect();
    // a covers the half-open slice [1, 3)
    assert_eq!(touched, vec![1, 2]);
}

#[test]
fn test_alias_concatenation() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] a;
qubit[2] b;
let joined = a ++ b;
x joined[0];
x joined[3];
"#;
    let module = unrolled(qasm);
    let touched: Vec<(String, usize)> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::GateCall(call) => {
                let (reg, idx) = call.qubits()[0].resolved_bit().unwrap();
                Some((reg.to_string(), idx))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        touched,
        vec![("a".to_string(), 0), ("b".to_string(), 1)]
    );
}

#[test]
fn test_alias_of_alias() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[4] q;
let a = q[0:2];
let b = a[1];
x b[0];
"#;
    let module = unrolled(qasm);
    let touched: Vec<usize> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::GateCall(call) => Some(call.qubits()[0].resolved_bit().unwrap().1),
            _ => None,
        })
        .collect();
    assert_eq!(touched, vec![1]);
}

#[test]
fn test_reset_expands_per_qubit() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[3] q;
reset q;
"#;
    let module = unrolled(qasm);
    let resets: Vec<usize> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::Reset(reset) => Some(reset.target().resolved_bit().unwrap().1),
            _ => None,
        })
        .collect();
    assert_eq!(resets, vec![0, 1, 2]);
}

#[test]
fn test_delay_with_duration() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
delay[100ns] q[0];
"#;
    let module = unrolled(qasm);
    let delays: Vec<&Stmt> = module
        .unrolled_statements()
        .iter()
        .filter(|s| matches!(s, Stmt::Delay(..)))
        .collect();
    assert_eq!(delays.len(), 1);
    let text = dumps(&module);
    assert!(text.contains("delay[100.0ns] q[0];"));
}

#[test]
fn test_duration_arithmetic_normalizes_to_ns() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
duration t = 2us + 500ns;
delay[t] q[0];
"#;
    let module = unrolled(qasm);
    let text = dumps(&module);
    assert!(text.contains("delay[2500.0ns] q[0];"));
}

#[test]
fn test_mixed_duration_units_rejected() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
duration t = 10dt + 5ns;
delay[t] q[0];
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Type);
}

#[test]
fn test_pragma_retained() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
pragma qiskit.shots 1024;
qubit[1] q;
h q[0];
"#;
    let module = unrolled(qasm);
    assert!(module
        .unrolled_statements()
        .iter()
        .any(|s| matches!(s, Stmt::Pragma(_))));
}

#[test]
fn test_defcalgrammar_retained_verbatim() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
defcalgrammar "openpulse";
qubit[1] q;
h q[0];
"#;
    let module = unrolled(qasm);
    let retained = module
        .unrolled_statements()
        .iter()
        .find(|s| matches!(s, Stmt::DefCalGrammar(_)));
    match retained {
        Some(Stmt::DefCalGrammar(block)) => {
            assert!(block.text().contains("openpulse"));
        }
        _ => unreachable!("defcalgrammar should pass through"),
    }
}

#[test]
fn test_cast_expression() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[4] q;
float[64] f = 2.9;
int[32] n = int[32](f);
h q[n];
"#;
    let module = unrolled(qasm);
    let touched: Vec<usize> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::GateCall(call) => Some(call.qubits()[0].resolved_bit().unwrap().1),
            _ => None,
        })
        .collect();
    // the cast truncates toward zero
    assert_eq!(touched, vec![2]);
}

#[test]
fn test_builtin_math_in_parameters() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
rz(2 * arccos(0.0)) q[0];
"#;
    let module = unrolled(qasm);
    match module
        .unrolled_statements()
        .iter()
        .find(|s| matches!(s, Stmt::GateCall(_)))
        .unwrap()
    {
        Stmt::GateCall(call) => match &call.params()[0] {
            oq3_unroller::ast::Expr::FloatLiteral(lit) => {
                assert!((lit.value() - std::f64::consts::PI).abs() < 1e-12);
            }
            _ => unreachable!(),
        },
        _ => unreachable!(),
    }
}

#[test]
fn test_gphase_emitted() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
gphase(0.25);
"#;
    let module = unrolled(qasm);
    assert!(module
        .unrolled_statements()
        .iter()
        .any(|s| matches!(s, Stmt::GPhase(_))));
}

#[test]
fn test_box_body_unrolls() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[2] q;
box {
    h q;
}
"#;
    let module = unrolled(qasm);
    let boxes: Vec<&Stmt> = module
        .unrolled_statements()
        .iter()
        .filter(|s| matches!(s, Stmt::Box_(_)))
        .collect();
    assert_eq!(boxes.len(), 1);
    match boxes[0] {
        Stmt::Box_(box_stmt) => {
            assert_eq!(box_stmt.body().len(), 2);
        }
        _ => unreachable!(),
    }
}
