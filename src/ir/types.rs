//! IR type system

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Void type
    Void,

    /// Integer type with bit width (e.g., i1, i8, i32, i64)
    Int(u32),

    /// IEEE-754 binary32
    Float,

    /// IEEE-754 binary64
    Double,

    /// Opaque pointer
    Ptr,

    /// Fixed-width vector type <N x T>
    Vector(u32, Box<Type>),
}

impl Type {
    pub fn i1() -> Self {
        Type::Int(1)
    }

    pub fn i8() -> Self {
        Type::Int(8)
    }

    pub fn i16() -> Self {
        Type::Int(16)
    }

    pub fn i32() -> Self {
        Type::Int(32)
    }

    pub fn i64() -> Self {
        Type::Int(64)
    }

    /// Build a vector type `<lanes x elem>`.
    pub fn vector(lanes: u32, elem: Type) -> Self {
        Type::Vector(lanes, Box::new(elem))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Type::Vector(..))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Integer scalar or integer vector.
    pub fn is_int_or_int_vector(&self) -> bool {
        matches!(self.element(), Type::Int(_))
    }

    /// Number of lanes for vectors, `None` for scalars.
    pub fn lanes(&self) -> Option<u32> {
        match self {
            Type::Vector(lanes, _) => Some(*lanes),
            _ => None,
        }
    }

    /// Element type for vectors, the type itself for scalars.
    pub fn element(&self) -> &Type {
        match self {
            Type::Vector(_, elem) => elem,
            other => other,
        }
    }

    /// Bit width of one element (or of the scalar itself).
    pub fn scalar_bits(&self) -> u32 {
        match self.element() {
            Type::Int(bits) => *bits,
            Type::Float => 32,
            Type::Double => 64,
            Type::Ptr => 64,
            Type::Void | Type::Vector(..) => 0,
        }
    }

    /// Total bit width of the value.
    pub fn bit_width(&self) -> u32 {
        self.scalar_bits() * self.lanes().unwrap_or(1)
    }

    /// Same shape (scalar or same lane count) with a different element type.
    ///
    /// Used to derive compare results (`i1` lanes) and cast targets.
    pub fn with_element(&self, elem: Type) -> Type {
        match self {
            Type::Vector(lanes, _) => Type::vector(*lanes, elem),
            _ => elem,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Ptr => write!(f, "ptr"),
            Type::Vector(lanes, elem) => write!(f, "<{} x {}>", lanes, elem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_width() {
        assert_eq!(Type::i32().bit_width(), 32);
        assert_eq!(Type::vector(16, Type::i8()).bit_width(), 128);
        assert_eq!(Type::vector(2, Type::Double).bit_width(), 128);
        assert_eq!(Type::vector(16, Type::i1()).bit_width(), 16);
    }

    #[test]
    fn test_with_element() {
        let v = Type::vector(8, Type::i16());
        assert_eq!(v.with_element(Type::i1()), Type::vector(8, Type::i1()));
        assert_eq!(Type::Double.with_element(Type::i64()), Type::i64());
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::vector(2, Type::Double).to_string(), "<2 x double>");
        assert_eq!(Type::i1().to_string(), "i1");
    }
}
