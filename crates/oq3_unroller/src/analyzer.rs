// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Classical analysis helpers: index and slice resolution, array element
// access, duplicate-qubit detection, and the expansion of comparisons on a
// classical register into chains of single-bit tests.

use crate::ast::{
    BinaryExpr, BinaryOp, Branch, Expr, GateOperand, Ident, IndexExpression, IndexKind, Span, Stmt,
};
use crate::error::{Error, Result};
use crate::value::{int_to_bits, Value};

/// Python-style `range(start, stop, step)`, bounded so a runaway range is
/// a diagnostic instead of an allocation.
fn stepped_range(start: i64, stop: i64, step: i64, limit: usize, span: Span) -> Result<Vec<i64>> {
    if step == 0 {
        return Err(Error::range("range step cannot be zero", span));
    }
    let mut out = Vec::new();
    let mut v = start;
    while (step > 0 && v < stop) || (step < 0 && v > stop) {
        if out.len() >= limit {
            return Err(Error::range(
                format!("range produces more than {limit} values"),
                span,
            ));
        }
        out.push(v);
        v += step;
    }
    Ok(out)
}

pub fn validate_register_index(index: i64, size: usize, qubit: bool, span: Span) -> Result<usize> {
    if index < 0 || index as usize >= size {
        return Err(Error::range(
            format!(
                "index {index} out of range for {} of size {size}",
                if qubit { "register" } else { "classical register" }
            ),
            span,
        ));
    }
    Ok(index as usize)
}

/// Slice `[a:b]` / `[a:b:s]` over a register of `size` bits, with the
/// half-open `[a, b)` reading.
pub fn slice_indices(
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
    size: usize,
    qubit: bool,
    span: Span,
) -> Result<Vec<usize>> {
    let step = step.unwrap_or(1);
    let (default_start, default_stop) = if step >= 0 {
        (0, size as i64)
    } else {
        (size as i64 - 1, -1)
    };
    let start = start.unwrap_or(default_start);
    let stop = stop.unwrap_or(default_stop);
    let values = stepped_range(start, stop, step, size + 1, span)?;
    values
        .into_iter()
        .map(|v| validate_register_index(v, size, qubit, span))
        .collect()
}

/// Loop range `[a:b]` / `[a:b:s]`: OpenQASM for-loop ranges include the
/// endpoint. `limit` bounds the unrolled iteration count.
pub fn loop_range_values(
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
    limit: usize,
    span: Span,
) -> Result<Vec<i64>> {
    let step = step.unwrap_or(1);
    let start = start.ok_or_else(|| Error::range("for-loop range requires a start", span))?;
    let stop = stop.ok_or_else(|| Error::range("for-loop range requires an end", span))?;
    stepped_range(start, stop + step, step, limit, span)
}

//
// Array access
//

pub fn find_array_element<'a>(value: &'a Value, indices: &[usize], span: Span) -> Result<&'a Value> {
    let mut current = value;
    for idx in indices {
        match current {
            Value::Array(values) => {
                current = values.get(*idx).ok_or_else(|| {
                    Error::range(format!("array index {idx} out of bounds"), span)
                })?;
            }
            _ => {
                return Err(Error::type_error(
                    "too many indices for array value",
                    span,
                ))
            }
        }
    }
    Ok(current)
}

pub fn update_array_element(
    value: &mut Value,
    indices: &[usize],
    new_value: Value,
    span: Span,
) -> Result<()> {
    if indices.is_empty() {
        *value = new_value;
        return Ok(());
    }
    match value {
        Value::Array(values) => {
            let idx = indices[0];
            let slot = values
                .get_mut(idx)
                .ok_or_else(|| Error::range(format!("array index {idx} out of bounds"), span))?;
            update_array_element(slot, &indices[1..], new_value, span)
        }
        _ => Err(Error::type_error("too many indices for array value", span)),
    }
}

/// Validate concrete indices against the declared dimensions.
pub fn validate_array_indices(indices: &[i64], dims: &[usize], span: Span) -> Result<Vec<usize>> {
    if indices.len() != dims.len() {
        return Err(Error::range(
            format!(
                "invalid number of indices: expected {} but got {}",
                dims.len(),
                indices.len()
            ),
            span,
        ));
    }
    indices
        .iter()
        .zip(dims.iter())
        .enumerate()
        .map(|(dim_num, (idx, dim))| {
            if *idx < 0 || *idx as usize >= *dim {
                Err(Error::range(
                    format!(
                        "index {idx} out of bounds for dimension {dim_num} of size {dim}"
                    ),
                    span,
                ))
            } else {
                Ok(*idx as usize)
            }
        })
        .collect()
}

//
// Duplicate detection
//

/// Find the first (register, index) pair mentioned twice among resolved
/// operands. Runs after broadcast expansion, on a single expanded call.
pub fn extract_duplicate_bit(operands: &[GateOperand]) -> Option<(String, usize)> {
    let mut seen = std::collections::HashSet::new();
    for operand in operands {
        if let Some((name, index)) = operand.resolved_bit() {
            if !seen.insert((name.to_string(), index)) {
                return Some((name.to_string(), index));
            }
        }
    }
    None
}

//
// Branch condition expansion
//

fn bit_test(reg: &str, index: usize, expected: bool, span: Span) -> Expr {
    BinaryExpr::new(
        BinaryOp::Eq,
        IndexExpression::new(
            Ident::new(reg, span).to_expr(),
            IndexKind::Expr(Expr::int(index as i64)),
            span,
        )
        .to_expr(),
        Expr::bool(expected),
        span,
    )
    .to_expr()
}

// Outcome of a comparison decided part-way through the bit scan.
fn decided_block(
    op: BinaryOp,
    register_greater: bool,
    if_block: &[Stmt],
    else_block: &[Stmt],
) -> Vec<Stmt> {
    use BinaryOp::*;
    let satisfied = match op {
        Eq => false,
        Neq => true,
        Lt | Le => !register_greater,
        Gt | Ge => register_greater,
        _ => false,
    };
    if satisfied {
        if_block.to_vec()
    } else {
        else_block.to_vec()
    }
}

/// Expand `reg <op> rhs` over a `bit[width]` register into a nested chain
/// of single-bit equality tests, MSB to LSB (`reg[0]` is the MSB). The
/// already-unrolled bodies are placed at the decided leaves.
pub fn expand_register_condition(
    reg: &str,
    width: usize,
    op: BinaryOp,
    rhs: i64,
    if_block: Vec<Stmt>,
    else_block: Vec<Stmt>,
    span: Span,
) -> Result<Vec<Stmt>> {
    use BinaryOp::*;
    if !op.is_comparison() {
        return Err(Error::unsupported(
            format!(
                "operator '{}' is not supported in conditions on a classical register",
                op.as_str()
            ),
            span,
        ));
    }

    // A right-hand side outside the register's value range decides the
    // comparison statically.
    let max = if width >= 63 {
        i64::MAX
    } else {
        (1i64 << width) - 1
    };
    if rhs < 0 || rhs > max {
        let satisfied = match op {
            Eq => false,
            Neq => true,
            Lt | Le => rhs > max,
            Gt | Ge => rhs < 0,
            _ => false,
        };
        return Ok(if satisfied { if_block } else { else_block });
    }

    let rhs_bits = int_to_bits(rhs, width);

    // Build the chain from the LSB outward: at each level the prefix above
    // is known equal, so a mismatch decides the comparison immediately.
    let mut inner = match op {
        // all bits equal
        Eq | Le | Ge => if_block.clone(),
        Neq | Lt | Gt => else_block.clone(),
        _ => unreachable!(),
    };
    for pos in (0..width).rev() {
        let expected = rhs_bits[pos];
        // mismatch at `pos` with equal prefix: register bit is !expected
        let register_greater = !expected;
        let mismatch = decided_block(op, register_greater, &if_block, &else_block);
        inner = vec![Branch::new(bit_test(reg, pos, expected, span), inner, mismatch, span).to_stmt()];
    }
    Ok(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_half_open() {
        assert_eq!(slice_indices(Some(0), Some(3), None, 4, true, None).unwrap(), vec![0, 1, 2]);
        assert_eq!(
            slice_indices(Some(0), Some(4), Some(2), 4, true, None).unwrap(),
            vec![0, 2]
        );
        assert!(slice_indices(Some(0), Some(5), None, 4, true, None).is_err());
    }

    #[test]
    fn test_loop_range_inclusive() {
        assert_eq!(
            loop_range_values(Some(0), Some(3), None, 100, None).unwrap(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(
            loop_range_values(Some(3), Some(0), Some(-1), 100, None).unwrap(),
            vec![3, 2, 1, 0]
        );
        assert!(loop_range_values(Some(0), Some(1000), None, 10, None).is_err());
    }

    #[test]
    fn test_duplicate_detection() {
        let ops = vec![
            GateOperand::bit("q", 0),
            GateOperand::bit("q", 1),
            GateOperand::bit("q", 0),
        ];
        assert_eq!(extract_duplicate_bit(&ops), Some(("q".to_string(), 0)));
        let ok = vec![GateOperand::bit("q", 0), GateOperand::bit("q", 1)];
        assert_eq!(extract_duplicate_bit(&ok), None);
    }

    #[test]
    fn test_equality_chain_shape() {
        // c == 3 over bit[4]: bits 0,0,1,1 MSB-first
        let body = vec![crate::ast::GateCall::basic("h", vec![GateOperand::bit("q", 0)]).to_stmt()];
        let out =
            expand_register_condition("c", 4, BinaryOp::Eq, 3, body, Vec::new(), None).unwrap();
        assert_eq!(out.len(), 1);
        let mut expected_bits = vec![false, false, true, true].into_iter();
        let mut current = &out[0];
        loop {
            let branch = match current {
                Stmt::Branch(b) => b,
                _ => unreachable!(),
            };
            let expected = expected_bits.next().unwrap();
            match branch.condition() {
                Expr::Binary(bin) => match bin.rhs() {
                    Expr::BoolLiteral(lit) => assert_eq!(lit.value(), expected),
                    _ => unreachable!(),
                },
                _ => unreachable!(),
            }
            if expected_bits.len() == 0 {
                assert!(matches!(branch.if_block()[0], Stmt::GateCall(_)));
                break;
            }
            current = &branch.if_block()[0];
        }
    }

    #[test]
    fn test_out_of_range_rhs_folds() {
        let body = vec![crate::ast::GateCall::basic("h", vec![GateOperand::bit("q", 0)]).to_stmt()];
        let out = expand_register_condition("c", 2, BinaryOp::Eq, 7, body.clone(), Vec::new(), None)
            .unwrap();
        assert!(out.is_empty());
        let out =
            expand_register_condition("c", 2, BinaryOp::Lt, 7, body, Vec::new(), None).unwrap();
        assert_eq!(out.len(), 1);
    }
}
