// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

use oq3_unroller::ast::{Expr, Stmt};
use oq3_unroller::{loads, QasmModule};

fn unrolled(source: &str) -> QasmModule {
    let mut module = loads(source).expect("program should load");
    module.unroll().expect("program should unroll");
    module
}

// Walk a nested single-bit chain collecting (index, expected) pairs.
fn collect_chain(stmt: &Stmt) -> (Vec<(usize, bool)>, Vec<Stmt>) {
    let mut tests = Vec::new();
    let mut current = stmt;
    loop {
        let branch = match current {
            Stmt::Branch(branch) => branch,
            _ => unreachable!("expected a branch, found {current:?}"),
        };
        let (index, expected) = match branch.condition() {
            Expr::Binary(bin) => {
                let index = match bin.lhs() {
                    Expr::Index(ie) => match ie.index() {
                        oq3_unroller::ast::IndexKind::Expr(Expr::IntLiteral(lit)) => {
                            lit.value() as usize
                        }
                        other => unreachable!("unexpected index {other:?}"),
                    },
                    other => unreachable!("unexpected lhs {other:?}"),
                };
                let expected = match bin.rhs() {
                    Expr::BoolLiteral(lit) => lit.value(),
                    other => unreachable!("unexpected rhs {other:?}"),
                };
                (index, expected)
            }
            other => unreachable!("unexpected condition {other:?}"),
        };
        tests.push((index, expected));
        match branch.if_block() {
            [inner @ Stmt::Branch(_)] => current = inner,
            body => return (tests, body.to_vec()),
        }
    }
}

#[test]
fn test_multi_bit_equality_expansion() {
    // c == 3 over bit[4]: MSB-first tests 0,0,1,1
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
bit[4] c;
if (c == 3) {
    h q[0];
}
"#;
    let module = unrolled(qasm);
    let branch = module
        .unrolled_statements()
        .iter()
        .find(|s| matches!(s, Stmt::Branch(_)))
        .expect("expansion should produce a branch chain");
    let (tests, body) = collect_chain(branch);
    assert_eq!(
        tests,
        vec![(0, false), (1, false), (2, true), (3, true)]
    );
    assert_eq!(body.len(), 1);
    assert!(matches!(&body[0], Stmt::GateCall(call) if call.name() == "h"));
}

#[test]
fn test_single_bit_condition() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
bit[1] c;
if (c[0]) {
    x q[0];
}
"#;
    let module = unrolled(qasm);
    let branch = module
        .unrolled_statements()
        .iter()
        .find(|s| matches!(s, Stmt::Branch(_)))
        .unwrap();
    let (tests, body) = collect_chain(branch);
    assert_eq!(tests, vec![(0, true)]);
    assert!(matches!(&body[0], Stmt::GateCall(call) if call.name() == "x"));
}

#[test]
fn test_negated_single_bit_condition() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
bit[1] c;
if (!c[0]) {
    x q[0];
}
"#;
    let module = unrolled(qasm);
    let branch = module
        .unrolled_statements()
        .iter()
        .find(|s| matches!(s, Stmt::Branch(_)))
        .unwrap();
    let (tests, _) = collect_chain(branch);
    assert_eq!(tests, vec![(0, false)]);
}

#[test]
fn test_else_block_lands_on_mismatch() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
bit[1] c;
if (c[0] == 1) {
    x q[0];
} else {
    h q[0];
}
"#;
    let module = unrolled(qasm);
    let branch = match module
        .unrolled_statements()
        .iter()
        .find(|s| matches!(s, Stmt::Branch(_)))
        .unwrap()
    {
        Stmt::Branch(branch) => branch,
        _ => unreachable!(),
    };
    assert!(matches!(&branch.if_block()[0], Stmt::GateCall(call) if call.name() == "x"));
    assert!(matches!(&branch.else_block()[0], Stmt::GateCall(call) if call.name() == "h"));
}

#[test]
fn test_constant_condition_folds() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
int[32] flag = 1;
if (flag == 1) {
    x q[0];
} else {
    h q[0];
}
"#;
    let module = unrolled(qasm);
    let names: Vec<&str> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::GateCall(call) => Some(call.name()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["x"]);
    assert!(!module
        .unrolled_statements()
        .iter()
        .any(|s| matches!(s, Stmt::Branch(_))));
}

#[test]
fn test_constant_false_takes_else() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
bool flag = false;
if (flag) {
    x q[0];
} else {
    h q[0];
}
"#;
    let module = unrolled(qasm);
    let names: Vec<&str> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::GateCall(call) => Some(call.name()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["h"]);
}

#[test]
fn test_comparison_ge_on_register() {
    // c >= 2 over bit[2]: only the MSB decides
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
bit[2] c;
if (c >= 2) {
    x q[0];
}
"#;
    let module = unrolled(qasm);
    // c >= 2 holds exactly when c[0] (MSB) is set, whatever c[1] is; the
    // chain therefore has x in both leaves under c[0] == true.
    let top = match module
        .unrolled_statements()
        .iter()
        .find(|s| matches!(s, Stmt::Branch(_)))
        .unwrap()
    {
        Stmt::Branch(branch) => branch,
        _ => unreachable!(),
    };
    match top.condition() {
        Expr::Binary(bin) => match bin.rhs() {
            Expr::BoolLiteral(lit) => assert!(lit.value()),
            _ => unreachable!(),
        },
        _ => unreachable!(),
    }
    // MSB set -> either leaf applies the gate
    fn contains_x(stmts: &[Stmt]) -> bool {
        stmts.iter().any(|s| match s {
            Stmt::GateCall(call) => call.name() == "x",
            Stmt::Branch(b) => contains_x(b.if_block()) || contains_x(b.else_block()),
            _ => false,
        })
    }
    assert!(contains_x(top.if_block()));
    assert!(!contains_x(top.else_block()));
}

#[test]
fn test_out_of_range_comparison_folds() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
bit[2] c;
if (c < 4) {
    x q[0];
}
"#;
    let module = unrolled(qasm);
    // c < 4 is always true for a two-bit register
    assert!(!module
        .unrolled_statements()
        .iter()
        .any(|s| matches!(s, Stmt::Branch(_))));
    assert!(module.unrolled_statements().iter().any(
        |s| matches!(s, Stmt::GateCall(call) if call.name() == "x")
    ));
}

#[test]
fn test_switch_selects_matching_case() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
int[32] sel = 2;
switch (sel) {
    case 1 {
        x q[0];
    }
    case 2 {
        h q[0];
    }
    default {
        z q[0];
    }
}
"#;
    let module = unrolled(qasm);
    let names: Vec<&str> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::GateCall(call) => Some(call.name()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["h"]);
}

#[test]
fn test_switch_default_taken() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
int[32] sel = 9;
switch (sel) {
    case 1 {
        x q[0];
    }
    default {
        z q[0];
    }
}
"#;
    let module = unrolled(qasm);
    let names: Vec<&str> = module
        .unrolled_statements()
        .iter()
        .filter_map(|s| match s {
            Stmt::GateCall(call) => Some(call.name()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["z"]);
}

#[test]
fn test_switch_duplicate_case_rejected() {
    let qasm = r#"
OPENQASM 3.0;
include "stdgates.inc";
qubit[1] q;
int[32] sel = 1;
switch (sel) {
    case 1, 1 {
        x q[0];
    }
}
"#;
    let mut module = loads(qasm).unwrap();
    let err = module.unroll().unwrap_err();
    assert_eq!(err.kind(), oq3_unroller::ErrorKind::Duplicate);
}
