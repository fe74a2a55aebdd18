// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Evaluation of classical expressions against the current scope. The
// evaluator is purely functional apart from the statements that subroutine
// calls inside expressions contribute to the output.

use num_complex::Complex64;

use crate::ast::{Expr, IndexKind, Span, Stmt};
use crate::error::{Error, Result};
use crate::value::{self, Value};
use crate::visitor::QasmVisitor;

/// Required result class for an evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Restriction {
    None,
    Int,
}

/// Built-in immutable identifiers.
pub(crate) fn builtin_constant(name: &str) -> Option<f64> {
    match name {
        "pi" | "π" => Some(std::f64::consts::PI),
        "tau" | "τ" => Some(std::f64::consts::TAU),
        "euler" | "ℇ" => Some(std::f64::consts::E),
        _ => None,
    }
}

fn is_builtin_function(name: &str) -> bool {
    matches!(
        name,
        "sin" | "cos" | "tan" | "arcsin" | "arccos" | "arctan" | "exp" | "ln" | "sqrt" | "pow"
            | "abs" | "mod"
    )
}

impl QasmVisitor {
    pub(crate) fn evaluate_const_int(&mut self, expr: &Expr, span: Span) -> Result<i64> {
        let (value, _) = self.evaluate_expression(expr, true, Restriction::Int)?;
        value.as_int(span)
    }

    /// Evaluate `expr` to a materialized value. Returns the value and any
    /// statements emitted by subroutine calls inside the expression.
    pub(crate) fn evaluate_expression(
        &mut self,
        expr: &Expr,
        const_expr: bool,
        restriction: Restriction,
    ) -> Result<(Value, Vec<Stmt>)> {
        let span = expr.span();
        match expr {
            Expr::IntLiteral(lit) => Ok((Value::Int(lit.value()), Vec::new())),
            Expr::BoolLiteral(lit) => {
                if restriction == Restriction::Int {
                    return Err(Error::type_error(
                        "expected an integer expression, found a bool literal",
                        span,
                    ));
                }
                Ok((Value::Bool(lit.value()), Vec::new()))
            }
            Expr::FloatLiteral(lit) => {
                if restriction == Restriction::Int {
                    return Err(Error::type_error(
                        format!(
                            "expected an integer expression, found float literal {}",
                            lit.value()
                        ),
                        span,
                    ));
                }
                Ok((Value::Float(lit.value()), Vec::new()))
            }
            Expr::BitStringLiteral(lit) => Ok((Value::Bits(lit.bits().to_vec()), Vec::new())),
            Expr::DurationLiteral(lit) => {
                Ok((value::normalize_duration(lit.value(), lit.unit()), Vec::new()))
            }
            Expr::ImaginaryLiteral(lit) => Ok((
                Value::Complex(Complex64::new(0.0, lit.value())),
                Vec::new(),
            )),

            Expr::Identifier(ident) => {
                let name = ident.name();
                if let Some(constant) = builtin_constant(name) {
                    if restriction == Restriction::Int {
                        return Err(Error::type_error(
                            format!("constant '{name}' is not allowed in an integer expression"),
                            span,
                        ));
                    }
                    return Ok((Value::Float(constant), Vec::new()));
                }
                let value = self.lookup_value(name, const_expr, restriction, span)?;
                Ok((value, Vec::new()))
            }

            Expr::HardwareQubit(hwq) => Err(Error::type_error(
                format!("hardware qubit '{}' in a classical expression", hwq.name()),
                span,
            )),

            Expr::Index(_) => {
                let (name, indices) = flatten_index_chain(expr, span)?;
                let mut index_values = Vec::with_capacity(indices.len());
                for index in &indices {
                    let (v, _) = self.evaluate_expression(index, const_expr, Restriction::Int)?;
                    index_values.push(v.as_int(span)?);
                }
                self.lookup_indexed_value(&name, &index_values, const_expr, restriction, span)
            }

            Expr::Unary(unary) => {
                let (operand, stmts) =
                    self.evaluate_expression(unary.operand(), const_expr, restriction)?;
                let out = value::unary_op(unary.op(), &operand, span)?;
                Ok((out, stmts))
            }

            Expr::Binary(binary) => {
                let (lhs, mut stmts) =
                    self.evaluate_expression(binary.lhs(), const_expr, restriction)?;
                let (rhs, rhs_stmts) =
                    self.evaluate_expression(binary.rhs(), const_expr, restriction)?;
                stmts.extend(rhs_stmts);
                let out = value::binary_op(binary.op(), &lhs, &rhs, span)?;
                Ok((out, stmts))
            }

            // An explicit cast reuses the same coercion pipeline as a
            // declaration initializer of the target type.
            Expr::Cast(cast) => {
                let (operand, stmts) =
                    self.evaluate_expression(cast.operand(), const_expr, Restriction::None)?;
                let (ty, _) = self.resolve_type_spec(cast.target(), false, span)?;
                let out = value::coerce(&operand, &ty, span)?;
                Ok((out, stmts))
            }

            Expr::Call(call) => {
                if is_builtin_function(call.name()) {
                    let mut args = Vec::new();
                    let mut stmts = Vec::new();
                    for arg in call.args() {
                        let (v, s) = self.evaluate_expression(arg, const_expr, Restriction::None)?;
                        stmts.extend(s);
                        args.push(v);
                    }
                    let out = apply_builtin(call.name(), &args, span)?;
                    return Ok((out, stmts));
                }
                if const_expr {
                    return Err(Error::type_error(
                        format!(
                            "subroutine call '{}' is not a compile-time constant",
                            call.name()
                        ),
                        span,
                    ));
                }
                let (value, stmts) = self.visit_function_call(call)?;
                match value {
                    Some(value) => Ok((value, stmts)),
                    None => Err(Error::type_error(
                        format!("subroutine '{}' does not return a value", call.name()),
                        span,
                    )),
                }
            }

            Expr::Measure(_) => Err(Error::unsupported(
                "quantum measurement results cannot be evaluated during unrolling",
                span,
            )),

            Expr::Range(_) => Err(Error::type_error(
                "a range is not a value",
                span,
            )),

            Expr::ArrayLiteral(_) => Err(Error::type_error(
                "array literals are only allowed as declaration initializers",
                span,
            )),
        }
    }

    fn lookup_value(
        &mut self,
        name: &str,
        const_expr: bool,
        restriction: Restriction,
        span: Span,
    ) -> Result<Value> {
        if !self.scopes.check_in_scope(name) {
            return Err(Error::undefined(
                format!("undefined identifier '{name}' in expression"),
                span,
            ));
        }
        let var = self.scopes.get_from_visible_scope(name).unwrap();
        if const_expr && !var.is_constant {
            return Err(Error::type_error(
                format!("variable '{name}' is not a constant in the given expression"),
                span,
            ));
        }
        if restriction == Restriction::Int
            && !matches!(var.ty, crate::types::Type::Int(..) | crate::types::Type::UInt(..))
        {
            return Err(Error::type_error(
                format!("invalid type of variable '{name}'; an integer is required"),
                span,
            ));
        }
        match &var.value {
            Some(value) => Ok(value.clone()),
            None => Err(Error::type_error(
                format!("uninitialized variable '{name}' in expression"),
                span,
            )),
        }
    }

    fn lookup_indexed_value(
        &mut self,
        name: &str,
        indices: &[i64],
        const_expr: bool,
        restriction: Restriction,
        span: Span,
    ) -> Result<(Value, Vec<Stmt>)> {
        let value = self.lookup_value(name, const_expr, Restriction::None, span)?;
        let out = match &value {
            Value::Bits(bits) => {
                if indices.len() != 1 {
                    return Err(Error::range(
                        format!("invalid number of indices for register '{name}'"),
                        span,
                    ));
                }
                let idx =
                    crate::analyzer::validate_register_index(indices[0], bits.len(), false, span)?;
                Value::Bool(bits[idx])
            }
            Value::Array(_) => {
                let dims = self
                    .scopes
                    .get_from_visible_scope(name)
                    .map(|v| v.dims.clone())
                    .unwrap_or_default();
                let checked = crate::analyzer::validate_array_indices(indices, &dims, span)?;
                crate::analyzer::find_array_element(&value, &checked, span)?.clone()
            }
            _ => {
                return Err(Error::type_error(
                    format!("variable '{name}' is not indexable"),
                    span,
                ))
            }
        };
        if restriction == Restriction::Int && !matches!(out, Value::Int(..) | Value::Bool(..)) {
            return Err(Error::type_error(
                format!("indexed value of '{name}' is not an integer"),
                span,
            ));
        }
        Ok((out, Vec::new()))
    }

    /// `true` if the expression reads any declared classical register:
    /// conditions on such expressions cannot be folded at compile time.
    pub(crate) fn classical_register_in_expr(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Identifier(ident) => self.registers.is_classical_register(ident.name()),
            Expr::Index(index) => match index.collection() {
                Expr::Identifier(ident) => self.registers.is_classical_register(ident.name()),
                nested => self.classical_register_in_expr(nested),
            },
            Expr::Binary(binary) => {
                self.classical_register_in_expr(binary.lhs())
                    || self.classical_register_in_expr(binary.rhs())
            }
            Expr::Unary(unary) => self.classical_register_in_expr(unary.operand()),
            Expr::Cast(cast) => self.classical_register_in_expr(cast.operand()),
            _ => false,
        }
    }
}

// The bottom of an `a[1][2]` chain is the identifier; indices come back in
// source order.
fn flatten_index_chain(expr: &Expr, span: Span) -> Result<(String, Vec<Expr>)> {
    let mut indices = Vec::new();
    let mut current = expr;
    loop {
        match current {
            Expr::Index(index) => {
                match index.index() {
                    IndexKind::Expr(e) => indices.push(e.clone()),
                    IndexKind::List(exprs) => {
                        for e in exprs.iter().rev() {
                            indices.push(e.clone());
                        }
                    }
                    _ => {
                        return Err(Error::unsupported(
                            "ranges and sets are not valid indices in classical expressions",
                            span,
                        ))
                    }
                }
                current = index.collection();
            }
            Expr::Identifier(ident) => {
                indices.reverse();
                return Ok((ident.name().to_string(), indices));
            }
            _ => {
                return Err(Error::type_error(
                    "only variables can be indexed in classical expressions",
                    span,
                ))
            }
        }
    }
}

fn apply_builtin(name: &str, args: &[Value], span: Span) -> Result<Value> {
    let arity = match name {
        "pow" | "mod" => 2,
        _ => 1,
    };
    if args.len() != arity {
        return Err(Error::arity(
            format!("builtin '{name}' expects {arity} argument(s), got {}", args.len()),
            span,
        ));
    }
    match name {
        "pow" => value::binary_op(crate::ast::BinaryOp::Pow, &args[0], &args[1], span),
        "mod" => value::binary_op(crate::ast::BinaryOp::Mod, &args[0], &args[1], span),
        "abs" => match &args[0] {
            Value::Int(v) => Ok(Value::Int(v.abs())),
            other => Ok(Value::Float(other.as_f64(span)?.abs())),
        },
        _ => {
            let x = args[0].as_f64(span)?;
            let out = match name {
                "sin" => x.sin(),
                "cos" => x.cos(),
                "tan" => x.tan(),
                "arcsin" => x.asin(),
                "arccos" => x.acos(),
                "arctan" => x.atan(),
                "exp" => x.exp(),
                "ln" => {
                    if x <= 0.0 {
                        return Err(Error::range(
                            format!("ln of non-positive value {x}"),
                            span,
                        ));
                    }
                    x.ln()
                }
                "sqrt" => {
                    if x < 0.0 {
                        return Err(Error::range(
                            format!("sqrt of negative value {x}"),
                            span,
                        ));
                    }
                    x.sqrt()
                }
                _ => unreachable!(),
            };
            if out.is_nan() {
                return Err(Error::range(
                    format!("builtin '{name}' produced an invalid result"),
                    span,
                ));
            }
            Ok(Value::Float(out))
        }
    }
}
