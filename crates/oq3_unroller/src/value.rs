// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Materialized classical values and the arithmetic on them. Operator
// semantics are C-like with the OpenQASM adjustments: `**` is power, `/`
// yields a float for integer operands, shifts and bitwise ops act on
// integers, logical ops on truth values.

use num_complex::Complex64;

use crate::ast::{BinaryOp, Span, TimeUnit, UnaryOp};
use crate::error::{Error, Result};
use crate::types::Type;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex64),
    /// Value of a bit register, MSB-first: `bits[0]` is `c[0]`.
    Bits(Vec<bool>),
    /// Durations in `ns` after unit normalization, or symbolic `dt` ticks.
    Duration(f64, TimeUnit),
    Array(Vec<Value>),
}

/// Largest finite `float[32]` magnitude per IEEE-754.
pub const FLOAT32_LIMIT: f64 = 1.70141183e38;

pub fn bits_to_int(bits: &[bool]) -> i64 {
    bits.iter().fold(0i64, |acc, b| (acc << 1) | i64::from(*b))
}

pub fn int_to_bits(value: i64, width: usize) -> Vec<bool> {
    (0..width)
        .rev()
        .map(|pos| (value >> pos) & 1 == 1)
        .collect()
}

impl Value {
    pub fn as_int(&self, span: Span) -> Result<i64> {
        match self {
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Int(v) => Ok(*v),
            Value::Bits(bits) => Ok(bits_to_int(bits)),
            Value::Float(v) if v.fract() == 0.0 => Ok(*v as i64),
            other => Err(Error::type_error(
                format!("expected an integer value, found '{}'", other.describe()),
                span,
            )),
        }
    }

    pub fn as_f64(&self, span: Span) -> Result<f64> {
        match self {
            Value::Bool(b) => Ok(f64::from(u8::from(*b))),
            Value::Int(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v),
            Value::Bits(bits) => Ok(bits_to_int(bits) as f64),
            other => Err(Error::type_error(
                format!("expected a numeric value, found '{}'", other.describe()),
                span,
            )),
        }
    }

    pub fn as_complex(&self, span: Span) -> Result<Complex64> {
        match self {
            Value::Complex(c) => Ok(*c),
            other => Ok(Complex64::new(other.as_f64(span)?, 0.0)),
        }
    }

    /// Non-zero test used for conditions.
    pub fn truthy(&self, span: Span) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(v) => Ok(*v != 0),
            Value::Float(v) => Ok(*v != 0.0),
            Value::Bits(bits) => Ok(bits.iter().any(|b| *b)),
            other => Err(Error::type_error(
                format!("value '{}' has no truth value", other.describe()),
                span,
            )),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Bool(..) | Value::Int(..) | Value::Float(..) | Value::Complex(..) | Value::Bits(..)
        )
    }

    /// Short rendering for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Complex(c) => format!("{} + {}im", c.re, c.im),
            Value::Bits(bits) => bits
                .iter()
                .map(|b| if *b { '1' } else { '0' })
                .collect::<String>(),
            Value::Duration(v, unit) => format!("{}{}", v, unit.suffix()),
            Value::Array(values) => format!("array of {} elements", values.len()),
        }
    }

    /// Fold a scalar value back into a literal expression, when possible.
    pub fn to_expr(&self) -> Option<crate::ast::Expr> {
        use crate::ast::Expr;
        match self {
            Value::Bool(b) => Some(Expr::bool(*b)),
            Value::Int(v) => Some(Expr::int(*v)),
            Value::Float(v) => Some(Expr::float(*v)),
            Value::Duration(v, unit) => {
                Some(crate::ast::DurationLiteral::new(*v, *unit, None).to_expr())
            }
            _ => None,
        }
    }
}

/// Normalize a duration literal: `s`, `ms`, `us` scale to `ns`; `dt` stays
/// symbolic.
pub fn normalize_duration(value: f64, unit: TimeUnit) -> Value {
    match unit {
        TimeUnit::Second => Value::Duration(value * 1e9, TimeUnit::NanoSecond),
        TimeUnit::MilliSecond => Value::Duration(value * 1e6, TimeUnit::NanoSecond),
        TimeUnit::MicroSecond => Value::Duration(value * 1e3, TimeUnit::NanoSecond),
        TimeUnit::NanoSecond => Value::Duration(value, TimeUnit::NanoSecond),
        TimeUnit::Dt => Value::Duration(value, TimeUnit::Dt),
    }
}

enum NumericClass {
    Complex,
    Float,
    Int,
}

fn classify(lhs: &Value, rhs: &Value) -> Option<NumericClass> {
    if !lhs.is_numeric() || !rhs.is_numeric() {
        return None;
    }
    if matches!(lhs, Value::Complex(_)) || matches!(rhs, Value::Complex(_)) {
        Some(NumericClass::Complex)
    } else if matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_)) {
        Some(NumericClass::Float)
    } else {
        Some(NumericClass::Int)
    }
}

pub fn binary_op(op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> Result<Value> {
    use BinaryOp::*;

    if let (Value::Duration(..), _) | (_, Value::Duration(..)) = (lhs, rhs) {
        return duration_binary_op(op, lhs, rhs, span);
    }

    match op {
        Add | Sub | Mul | Div | Mod | Pow => arith_op(op, lhs, rhs, span),
        Eq | Neq | Lt | Le | Gt | Ge => compare_op(op, lhs, rhs, span),
        AndAnd => Ok(Value::Bool(lhs.truthy(span)? && rhs.truthy(span)?)),
        OrOr => Ok(Value::Bool(lhs.truthy(span)? || rhs.truthy(span)?)),
        BitAnd => Ok(Value::Int(lhs.as_int(span)? & rhs.as_int(span)?)),
        BitOr => Ok(Value::Int(lhs.as_int(span)? | rhs.as_int(span)?)),
        BitXor => Ok(Value::Int(lhs.as_int(span)? ^ rhs.as_int(span)?)),
        Shl => shift_op(lhs, rhs, span, true),
        Shr => shift_op(lhs, rhs, span, false),
        Concat => Err(Error::unsupported(
            "'++' concatenation is only valid in alias statements",
            span,
        )),
    }
}

fn shift_op(lhs: &Value, rhs: &Value, span: Span, left: bool) -> Result<Value> {
    let amount = rhs.as_int(span)?;
    if !(0..64).contains(&amount) {
        return Err(Error::range(
            format!("shift amount {amount} out of range"),
            span,
        ));
    }
    let value = lhs.as_int(span)?;
    Ok(Value::Int(if left {
        value.wrapping_shl(amount as u32)
    } else {
        value >> amount
    }))
}

fn arith_op(op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> Result<Value> {
    use BinaryOp::*;
    let class = classify(lhs, rhs).ok_or_else(|| {
        Error::type_error(
            format!(
                "invalid operands '{}' and '{}' for operator '{}'",
                lhs.describe(),
                rhs.describe(),
                op.as_str()
            ),
            span,
        )
    })?;

    match class {
        NumericClass::Complex => {
            let a = lhs.as_complex(span)?;
            let b = rhs.as_complex(span)?;
            let out = match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                Pow => a.powc(b),
                Mod => {
                    return Err(Error::type_error(
                        "'%' is not defined for complex values",
                        span,
                    ))
                }
                _ => unreachable!(),
            };
            Ok(Value::Complex(out))
        }
        NumericClass::Float => {
            let a = lhs.as_f64(span)?;
            let b = rhs.as_f64(span)?;
            if matches!(op, Div | Mod) && b == 0.0 {
                return Err(Error::range("division by zero", span));
            }
            let out = match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                Mod => a % b,
                Pow => a.powf(b),
                _ => unreachable!(),
            };
            Ok(Value::Float(out))
        }
        NumericClass::Int => {
            let a = lhs.as_int(span)?;
            let b = rhs.as_int(span)?;
            match op {
                Add => Ok(Value::Int(a.wrapping_add(b))),
                Sub => Ok(Value::Int(a.wrapping_sub(b))),
                Mul => Ok(Value::Int(a.wrapping_mul(b))),
                // Integer division produces a float.
                Div => {
                    if b == 0 {
                        Err(Error::range("division by zero", span))
                    } else {
                        Ok(Value::Float(a as f64 / b as f64))
                    }
                }
                Mod => {
                    if b == 0 {
                        Err(Error::range("division by zero", span))
                    } else {
                        Ok(Value::Int(a.rem_euclid(b)))
                    }
                }
                Pow => {
                    if b >= 0 {
                        match u32::try_from(b).ok().and_then(|e| a.checked_pow(e)) {
                            Some(v) => Ok(Value::Int(v)),
                            None => Err(Error::range(
                                format!("integer overflow computing {a} ** {b}"),
                                span,
                            )),
                        }
                    } else {
                        Ok(Value::Float((a as f64).powi(b as i32)))
                    }
                }
                _ => unreachable!(),
            }
        }
    }
}

fn compare_op(op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> Result<Value> {
    use BinaryOp::*;
    if let (Value::Bool(a), Value::Bool(b)) = (lhs, rhs) {
        return match op {
            Eq => Ok(Value::Bool(a == b)),
            Neq => Ok(Value::Bool(a != b)),
            _ => Err(Error::type_error(
                format!("operator '{}' is not defined for bool operands", op.as_str()),
                span,
            )),
        };
    }
    let a = lhs.as_f64(span)?;
    let b = rhs.as_f64(span)?;
    let out = match op {
        Eq => a == b,
        Neq => a != b,
        Lt => a < b,
        Le => a <= b,
        Gt => a > b,
        Ge => a >= b,
        _ => unreachable!(),
    };
    Ok(Value::Bool(out))
}

fn duration_binary_op(op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> Result<Value> {
    use BinaryOp::*;
    match (lhs, rhs) {
        (Value::Duration(a, ua), Value::Duration(b, ub)) => {
            if ua != ub {
                return Err(Error::type_error(
                    "cannot combine 'dt' durations with wall-clock durations",
                    span,
                ));
            }
            match op {
                Add => Ok(Value::Duration(a + b, *ua)),
                Sub => Ok(Value::Duration(a - b, *ua)),
                Div => {
                    if *b == 0.0 {
                        Err(Error::range("division by zero", span))
                    } else {
                        Ok(Value::Float(a / b))
                    }
                }
                Eq => Ok(Value::Bool(a == b)),
                Neq => Ok(Value::Bool(a != b)),
                Lt => Ok(Value::Bool(a < b)),
                Le => Ok(Value::Bool(a <= b)),
                Gt => Ok(Value::Bool(a > b)),
                Ge => Ok(Value::Bool(a >= b)),
                _ => Err(Error::type_error(
                    format!("operator '{}' is not defined for durations", op.as_str()),
                    span,
                )),
            }
        }
        (Value::Duration(a, unit), scalar) => match op {
            Mul => Ok(Value::Duration(a * scalar.as_f64(span)?, *unit)),
            Div => {
                let s = scalar.as_f64(span)?;
                if s == 0.0 {
                    Err(Error::range("division by zero", span))
                } else {
                    Ok(Value::Duration(a / s, *unit))
                }
            }
            _ => Err(Error::type_error(
                format!(
                    "operator '{}' is not defined between a duration and '{}'",
                    op.as_str(),
                    scalar.describe()
                ),
                span,
            )),
        },
        (scalar, Value::Duration(b, unit)) => match op {
            Mul => Ok(Value::Duration(scalar.as_f64(span)? * b, *unit)),
            _ => Err(Error::type_error(
                format!(
                    "operator '{}' is not defined between '{}' and a duration",
                    op.as_str(),
                    scalar.describe()
                ),
                span,
            )),
        },
        _ => unreachable!(),
    }
}

pub fn unary_op(op: UnaryOp, operand: &Value, span: Span) -> Result<Value> {
    match op {
        UnaryOp::Minus => match operand {
            Value::Int(v) => Ok(Value::Int(-v)),
            Value::Float(v) => Ok(Value::Float(-v)),
            Value::Complex(c) => Ok(Value::Complex(-c)),
            Value::Bool(b) => Ok(Value::Int(-i64::from(*b))),
            Value::Duration(v, unit) => Ok(Value::Duration(-v, *unit)),
            other => Err(Error::type_error(
                format!("cannot negate '{}'", other.describe()),
                span,
            )),
        },
        UnaryOp::Not => Ok(Value::Bool(!operand.truthy(span)?)),
        UnaryOp::BitNot => match operand {
            Value::Bits(bits) => Ok(Value::Bits(bits.iter().map(|b| !b).collect())),
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => {
                let v = other.as_int(span)?;
                Ok(Value::Int(!v))
            }
        },
    }
}

const TAU: f64 = std::f64::consts::TAU;

fn wrap_signed(value: i64, width: u32) -> i64 {
    if width >= 64 {
        return value;
    }
    let modulus = 1i128 << width;
    let mut v = (value as i128).rem_euclid(modulus);
    if v >= modulus / 2 {
        v -= modulus;
    }
    v as i64
}

fn wrap_unsigned(value: i64, width: u32) -> i64 {
    if width >= 63 {
        return value;
    }
    (value as i128).rem_euclid(1i128 << width) as i64
}

/// Coerce `value` to the declared type `ty`, implementing the implicit cast
/// lattice. Assignment to a sized type truncates or wraps; a `const` target
/// that would overflow is a diagnostic instead.
pub fn coerce(value: &Value, ty: &Type, span: Span) -> Result<Value> {
    let type_mismatch = |value: &Value| {
        Error::type_error(
            format!("cannot assign value '{}' to type '{}'", value.describe(), ty),
            span,
        )
    };
    match ty {
        Type::Bool(_) => Ok(Value::Bool(value.truthy(span)?)),
        Type::Bit(_) => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Int(v) => Ok(Value::Bool(*v != 0)),
            Value::Bits(bits) if bits.len() == 1 => Ok(Value::Bool(bits[0])),
            _ => Err(type_mismatch(value)),
        },
        Type::Int(width, _) => {
            if matches!(value, Value::Complex(_) | Value::Duration(..) | Value::Array(_)) {
                return Err(type_mismatch(value));
            }
            let v = match value {
                Value::Float(f) => *f as i64,
                other => other.as_int(span)?,
            };
            match width {
                Some(w) => {
                    let wrapped = wrap_signed(v, *w);
                    if ty.is_const() && wrapped != v {
                        return Err(Error::type_error(
                            format!("value {v} overflows const int[{w}]"),
                            span,
                        ));
                    }
                    Ok(Value::Int(wrapped))
                }
                None => Ok(Value::Int(v)),
            }
        }
        Type::UInt(width, _) => {
            if matches!(value, Value::Complex(_) | Value::Duration(..) | Value::Array(_)) {
                return Err(type_mismatch(value));
            }
            let v = match value {
                Value::Float(f) => *f as i64,
                other => other.as_int(span)?,
            };
            match width {
                Some(w) => Ok(Value::Int(wrap_unsigned(v, *w))),
                None => {
                    if v < 0 {
                        Err(Error::type_error(
                            format!("cannot assign negative value {v} to uint"),
                            span,
                        ))
                    } else {
                        Ok(Value::Int(v))
                    }
                }
            }
        }
        Type::Float(width, _) => {
            let v = value.as_f64(span)?;
            if *width == Some(32) && v.abs() > FLOAT32_LIMIT {
                return Err(Error::range(
                    format!("value {v} exceeds the float[32] range"),
                    span,
                ));
            }
            Ok(Value::Float(v))
        }
        // Stored modulo 2π with `width` bits of binary precision.
        Type::Angle(width, _) => {
            let v = value.as_f64(span)?.rem_euclid(TAU);
            let v = match width {
                Some(w) if *w < 53 => {
                    let steps = (1u64 << w) as f64;
                    (v / TAU * steps).round().rem_euclid(steps) / steps * TAU
                }
                _ => v,
            };
            Ok(Value::Float(v))
        }
        Type::Complex(_, _) => Ok(Value::Complex(value.as_complex(span)?)),
        Type::BitArray(size, _) => match value {
            Value::Bits(bits) => {
                if bits.len() == *size {
                    Ok(Value::Bits(bits.clone()))
                } else {
                    Err(Error::type_error(
                        format!(
                            "bit string of width {} cannot initialize '{}'",
                            bits.len(),
                            ty
                        ),
                        span,
                    ))
                }
            }
            other => {
                let v = other.as_int(span)?;
                Ok(Value::Bits(int_to_bits(
                    wrap_unsigned(v, *size as u32),
                    *size,
                )))
            }
        },
        Type::Duration(_) | Type::Stretch(_) => match value {
            Value::Duration(..) => Ok(value.clone()),
            _ => Err(type_mismatch(value)),
        },
        Type::Array(element, _) => match value {
            Value::Array(values) => {
                let coerced = values
                    .iter()
                    .map(|v| coerce(v, element, span))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(coerced))
            }
            _ => Err(type_mismatch(value)),
        },
        _ => Err(type_mismatch(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IsConst;

    #[test]
    fn test_bits_round_trip() {
        assert_eq!(bits_to_int(&[false, false, true, true]), 3);
        assert_eq!(int_to_bits(3, 4), vec![false, false, true, true]);
        assert_eq!(bits_to_int(&int_to_bits(11, 5)), 11);
    }

    #[test]
    fn test_int_division_is_float() {
        let out = binary_op(BinaryOp::Div, &Value::Int(7), &Value::Int(2), None).unwrap();
        assert_eq!(out, Value::Float(3.5));
    }

    #[test]
    fn test_division_by_zero() {
        let err = binary_op(BinaryOp::Div, &Value::Int(1), &Value::Int(0), None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Range);
    }

    #[test]
    fn test_integer_power() {
        let out = binary_op(BinaryOp::Pow, &Value::Int(2), &Value::Int(10), None).unwrap();
        assert_eq!(out, Value::Int(1024));
    }

    #[test]
    fn test_uint_wraps() {
        let ty = Type::UInt(Some(4), IsConst::False);
        assert_eq!(coerce(&Value::Int(20), &ty, None).unwrap(), Value::Int(4));
        assert_eq!(coerce(&Value::Int(-1), &ty, None).unwrap(), Value::Int(15));
    }

    #[test]
    fn test_const_int_overflow_rejected() {
        let ty = Type::Int(Some(4), IsConst::True);
        assert!(coerce(&Value::Int(100), &ty, None).is_err());
        let loose = Type::Int(Some(4), IsConst::False);
        assert_eq!(coerce(&Value::Int(100), &loose, None).unwrap(), Value::Int(4));
    }

    #[test]
    fn test_angle_wraps_mod_tau() {
        let ty = Type::Angle(None, IsConst::False);
        let v = coerce(&Value::Float(3.0 * std::f64::consts::PI), &ty, None).unwrap();
        match v {
            Value::Float(f) => assert!((f - std::f64::consts::PI).abs() < 1e-12),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_duration_units() {
        let d = normalize_duration(2.0, TimeUnit::MicroSecond);
        assert_eq!(d, Value::Duration(2000.0, TimeUnit::NanoSecond));
        let dt = normalize_duration(10.0, TimeUnit::Dt);
        let sum = binary_op(BinaryOp::Add, &dt, &dt, None).unwrap();
        assert_eq!(sum, Value::Duration(20.0, TimeUnit::Dt));
        assert!(binary_op(BinaryOp::Add, &d, &dt, None).is_err());
    }
}
