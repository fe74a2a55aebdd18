// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Symbol substitution used when inlining gate bodies: formal parameter
// names become the caller's values, formal qubit names become the caller's
// resolved operands.

use hashbrown::HashMap;

use crate::ast::{Expr, GPhase, GateCall, GateOperand, IndexKind, Span};
use crate::error::{Error, Result};
use crate::value::Value;

fn value_to_literal(value: &Value) -> Option<Expr> {
    value.to_expr()
}

/// Replace every identifier bound in `map` by its literal value.
pub(crate) fn transform_expression(expr: &Expr, map: &HashMap<String, Value>) -> Expr {
    match expr {
        Expr::Identifier(ident) => match map.get(ident.name()).and_then(value_to_literal) {
            Some(folded) => folded,
            None => expr.clone(),
        },
        Expr::Unary(unary) => crate::ast::UnaryExpr::new(
            unary.op(),
            transform_expression(unary.operand(), map),
            unary.span,
        )
        .to_expr(),
        Expr::Binary(binary) => crate::ast::BinaryExpr::new(
            binary.op(),
            transform_expression(binary.lhs(), map),
            transform_expression(binary.rhs(), map),
            binary.span,
        )
        .to_expr(),
        Expr::Cast(cast) => crate::ast::CastExpr::new(
            cast.target().clone(),
            transform_expression(cast.operand(), map),
            cast.span,
        )
        .to_expr(),
        Expr::Call(call) => crate::ast::FunctionCall::new(
            call.name(),
            call.args()
                .iter()
                .map(|arg| transform_expression(arg, map))
                .collect(),
            call.span,
        )
        .to_expr(),
        Expr::Index(index) => {
            let new_index = match index.index() {
                IndexKind::Expr(e) => IndexKind::Expr(transform_expression(e, map)),
                other => other.clone(),
            };
            crate::ast::IndexExpression::new(
                transform_expression(index.collection(), map),
                new_index,
                index.span,
            )
            .to_expr()
        }
        other => other.clone(),
    }
}

/// Substitute parameter values into the arguments of a gate call inside a
/// gate body, including the exponents of pow modifiers.
pub(crate) fn transform_gate_params(call: &mut GateCall, param_map: &HashMap<String, Value>) {
    for param in call.params.iter_mut() {
        *param = transform_expression(param, param_map);
    }
    for modifier in call.modifiers.iter_mut() {
        if let crate::ast::GateModifier::Pow(expr) = modifier {
            *expr = transform_expression(expr, param_map);
        }
    }
}

/// Substitute the actual qubit operands for the formal qubit names used in
/// a gate body. Indexing a formal qubit argument is not meaningful.
pub(crate) fn transform_gate_qubits(
    call: &mut GateCall,
    qubit_map: &HashMap<String, GateOperand>,
    span: Span,
) -> Result<()> {
    for qubit in call.qubits.iter_mut() {
        match qubit {
            GateOperand::Identifier(ident) => {
                let replacement = qubit_map.get(ident.name()).ok_or_else(|| {
                    Error::undefined(
                        format!(
                            "undefined qubit '{}' in the body of gate '{}'",
                            ident.name(),
                            call.name
                        ),
                        span,
                    )
                })?;
                *qubit = replacement.clone();
            }
            GateOperand::Indexed(indexed) => {
                return Err(Error::unsupported(
                    format!(
                        "indexing '{}' is not supported in a gate definition",
                        indexed.name()
                    ),
                    span,
                ));
            }
            GateOperand::HardwareQubit(_) => {}
        }
    }
    Ok(())
}

/// gphase inside a gate body: substitute the argument; an empty qubit list
/// means the phase applies to all of the gate's qubits.
pub(crate) fn transform_gphase(
    gphase: &mut GPhase,
    param_map: &HashMap<String, Value>,
    qubit_map: &HashMap<String, GateOperand>,
) -> Result<()> {
    gphase.arg = transform_expression(&gphase.arg, param_map);
    if gphase.qubits.is_empty() {
        return Ok(());
    }
    for qubit in gphase.qubits.iter_mut() {
        if let GateOperand::Identifier(ident) = qubit {
            if let Some(replacement) = qubit_map.get(ident.name()) {
                *qubit = replacement.clone();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_substitution() {
        let mut map = HashMap::new();
        map.insert("theta".to_string(), Value::Float(1.5));
        let expr = crate::ast::BinaryExpr::new(
            crate::ast::BinaryOp::Div,
            Expr::ident("theta"),
            Expr::int(2),
            None,
        )
        .to_expr();
        let out = transform_expression(&expr, &map);
        match out {
            Expr::Binary(bin) => match bin.lhs() {
                Expr::FloatLiteral(lit) => assert_eq!(lit.value(), 1.5),
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_qubit_substitution() {
        let mut qubit_map = HashMap::new();
        qubit_map.insert("a".to_string(), GateOperand::bit("q", 2));
        let mut call = GateCall::new(
            "h",
            Vec::new(),
            vec![GateOperand::Identifier(crate::ast::Ident::new("a", None))],
            Vec::new(),
            None,
        );
        transform_gate_qubits(&mut call, &qubit_map, None).unwrap();
        assert_eq!(call.qubits()[0].resolved_bit(), Some(("q", 2)));
    }
}
