// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// The semantic types used to annotate variables and check assignments.
// Widths are fixed when a declaration is evaluated; `None` means the width
// was not specified ("machine" int, float, ...).

use std::fmt;

use boolenum::BoolEnum;

#[derive(BoolEnum, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IsConst {
    True,
    False,
}

/// Bit width of primitive classical types.
pub type Width = Option<u32>;

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    // Scalar classical types
    Bit(IsConst),
    Bool(IsConst),
    Int(Width, IsConst),
    UInt(Width, IsConst),
    Float(Width, IsConst),
    Angle(Width, IsConst),
    Complex(Width, IsConst), // width of one component
    Duration(IsConst),
    Stretch(IsConst),

    // Quantum
    Qubit,
    HardwareQubit,
    QubitArray(usize),

    // Registers and arrays
    BitArray(usize, IsConst),
    Array(Box<Type>, Vec<usize>),

    Void,
    // Erroneously non-existent, e.g. the type of an unresolved identifier.
    Undefined,
}

impl Type {
    pub fn is_scalar(&self) -> bool {
        use Type::*;
        matches!(
            self,
            Bit(..)
                | Bool(..)
                | Int(..)
                | UInt(..)
                | Float(..)
                | Angle(..)
                | Complex(..)
                | Duration(..)
                | Stretch(..)
        )
    }

    pub fn is_quantum(&self) -> bool {
        matches!(
            self,
            Type::Qubit | Type::HardwareQubit | Type::QubitArray(..)
        )
    }

    pub fn width(&self) -> Width {
        use Type::*;
        match self {
            Int(w, _) | UInt(w, _) | Float(w, _) | Angle(w, _) | Complex(w, _) => *w,
            _ => None,
        }
    }

    /// `true` if the type carries the `const` attribute. Types that cannot
    /// be rebound (qubits, gates) count as const.
    pub fn is_const(&self) -> bool {
        use Type::*;
        match self {
            Bit(c) | Bool(c) | Int(_, c) | UInt(_, c) | Float(_, c) | Angle(_, c)
            | Complex(_, c) | Duration(c) | Stretch(c) | BitArray(_, c) => {
                matches!(*c, IsConst::True)
            }
            Array(..) => false,
            _ => true,
        }
    }

    pub fn dims(&self) -> Option<Vec<usize>> {
        use Type::*;
        match self {
            QubitArray(n) => Some(vec![*n]),
            BitArray(n, _) => Some(vec![*n]),
            Array(_, dims) => Some(dims.clone()),
            _ => None,
        }
    }

    pub fn num_dims(&self) -> usize {
        self.dims().map_or(0, |d| d.len())
    }

    /// Register length for qubit and bit registers, `None` for scalars.
    pub fn register_size(&self) -> Option<usize> {
        match self {
            Type::QubitArray(n) | Type::BitArray(n, _) => Some(*n),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem, _) => Some(elem),
            _ => None,
        }
    }
}

// Return `true` if `ty1 == ty2` except that the `is_const` property is
// allowed to differ.
pub(crate) fn equal_up_to_constness(ty1: &Type, ty2: &Type) -> bool {
    use Type::*;
    if ty1 == ty2 {
        return true;
    }
    match (ty1, ty2) {
        (Bit(_), Bit(_)) => true,
        (Bool(_), Bool(_)) => true,
        (Duration(_), Duration(_)) => true,
        (Stretch(_), Stretch(_)) => true,
        (Int(w1, _), Int(w2, _)) => w1 == w2,
        (UInt(w1, _), UInt(w2, _)) => w1 == w2,
        (Float(w1, _), Float(w2, _)) => w1 == w2,
        (Angle(w1, _), Angle(w2, _)) => w1 == w2,
        (Complex(w1, _), Complex(w2, _)) => w1 == w2,
        (BitArray(n1, _), BitArray(n2, _)) => n1 == n2,
        _ => false,
    }
}

fn promote_constness(ty1: &Type, ty2: &Type) -> IsConst {
    IsConst::from(ty1.is_const() && ty2.is_const())
}

// The width `None` is the greatest width.
fn promote_width(ty1: &Type, ty2: &Type) -> Width {
    match (ty1.width(), ty2.width()) {
        (Some(w1), Some(w2)) => Some(std::cmp::max(w1, w2)),
        _ => None,
    }
}

/// Common type for the operands of an arithmetic binary operation.
/// Returns `Void` when the types cannot be joined.
pub fn promote_types(ty1: &Type, ty2: &Type) -> Type {
    use Type::*;
    if equal_up_to_constness(ty1, ty2) {
        return ty1.clone();
    }
    let isconst = promote_constness(ty1, ty2);
    match (ty1, ty2) {
        (Int(..), Int(..)) => Int(promote_width(ty1, ty2), isconst),
        (UInt(..), UInt(..)) => UInt(promote_width(ty1, ty2), isconst),
        (Float(..), Float(..)) => Float(promote_width(ty1, ty2), isconst),
        (Int(..) | UInt(..), Float(..)) | (Float(..), Int(..) | UInt(..)) => {
            Float(promote_width(ty1, ty2), isconst)
        }
        (Int(..) | UInt(..) | Float(..), Complex(..))
        | (Complex(..), Int(..) | UInt(..) | Float(..)) => {
            Complex(promote_width(ty1, ty2), isconst)
        }
        (Int(..), UInt(..)) | (UInt(..), Int(..)) => Int(promote_width(ty1, ty2), isconst),
        (Bool(..) | Bit(..), Int(..)) | (Int(..), Bool(..) | Bit(..)) => {
            Int(promote_width(ty1, ty2), isconst)
        }
        _ => Void,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Type::*;
        let write_width = |f: &mut fmt::Formatter<'_>, w: &Width| match w {
            Some(w) => write!(f, "[{w}]"),
            None => Ok(()),
        };
        match self {
            Bit(_) => write!(f, "bit"),
            Bool(_) => write!(f, "bool"),
            Int(w, _) => {
                write!(f, "int")?;
                write_width(f, w)
            }
            UInt(w, _) => {
                write!(f, "uint")?;
                write_width(f, w)
            }
            Float(w, _) => {
                write!(f, "float")?;
                write_width(f, w)
            }
            Angle(w, _) => {
                write!(f, "angle")?;
                write_width(f, w)
            }
            Complex(w, _) => match w {
                Some(w) => write!(f, "complex[float[{w}]]"),
                None => write!(f, "complex"),
            },
            Duration(_) => write!(f, "duration"),
            Stretch(_) => write!(f, "stretch"),
            Qubit => write!(f, "qubit"),
            HardwareQubit => write!(f, "hardware qubit"),
            QubitArray(n) => write!(f, "qubit[{n}]"),
            BitArray(n, _) => write!(f, "bit[{n}]"),
            Array(elem, dims) => {
                write!(f, "array[{elem}")?;
                for dim in dims {
                    write!(f, ", {dim}")?;
                }
                write!(f, "]")
            }
            Void => write!(f, "void"),
            Undefined => write!(f, "undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_predicates() {
        let t = Type::Bit(IsConst::False);
        assert!(!t.is_const());
        assert!(t.width().is_none());
        assert!(!t.is_quantum());
        assert!(t.is_scalar());

        let q = Type::QubitArray(4);
        assert!(q.is_quantum());
        assert!(!q.is_scalar());
        assert_eq!(q.register_size(), Some(4));
    }

    #[test]
    fn test_promotion() {
        let i32t = Type::Int(Some(32), IsConst::False);
        let i64t = Type::Int(Some(64), IsConst::False);
        assert_eq!(promote_types(&i32t, &i64t), Type::Int(Some(64), IsConst::False));

        let f = Type::Float(Some(64), IsConst::True);
        assert_eq!(promote_types(&i32t, &f), Type::Float(Some(64), IsConst::False));
        assert_eq!(
            promote_types(&Type::Duration(IsConst::False), &f),
            Type::Void
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::Int(Some(32), IsConst::False).to_string(), "int[32]");
        assert_eq!(Type::Complex(Some(64), IsConst::False).to_string(), "complex[float[64]]");
        assert_eq!(Type::BitArray(3, IsConst::False).to_string(), "bit[3]");
    }
}
