//! Compile-time constants

use super::Type;
use std::fmt;

/// A constant value.
///
/// Integers are stored zero-extended and masked to their width; floating
/// point constants keep their raw bit pattern so that equality is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Integer constant of the given width
    Int { bits: u32, value: u64 },

    /// `float` constant (raw bits)
    Float(u32),

    /// `double` constant (raw bits)
    Double(u64),

    /// Constant vector, one entry per lane
    Vector(Vec<Constant>),

    /// `zeroinitializer` of the given type
    Zero(Type),

    /// `undef` of the given type
    Undef(Type),
}

/// Mask a value to `bits` bits.
pub fn mask_to(bits: u32, value: u64) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Sign-extend the low `bits` bits of `value` to 64 bits.
pub fn sign_extend(bits: u32, value: u64) -> i64 {
    if bits == 0 || bits >= 64 {
        value as i64
    } else {
        let shift = 64 - bits;
        ((value << shift) as i64) >> shift
    }
}

impl Constant {
    pub fn int(bits: u32, value: u64) -> Self {
        Constant::Int { bits, value: mask_to(bits, value) }
    }

    pub fn bool(value: bool) -> Self {
        Constant::Int { bits: 1, value: value as u64 }
    }

    pub fn double(value: f64) -> Self {
        Constant::Double(value.to_bits())
    }

    pub fn float(value: f32) -> Self {
        Constant::Float(value.to_bits())
    }

    /// Vector with `scalar` in every lane.
    pub fn splat(lanes: u32, scalar: Constant) -> Self {
        Constant::Vector(vec![scalar; lanes as usize])
    }

    /// Type of this constant.
    pub fn ty(&self) -> Type {
        match self {
            Constant::Int { bits, .. } => Type::Int(*bits),
            Constant::Float(_) => Type::Float,
            Constant::Double(_) => Type::Double,
            Constant::Vector(lanes) => {
                let elem = lanes.first().map(Constant::ty).unwrap_or(Type::Void);
                Type::vector(lanes.len() as u32, elem)
            }
            Constant::Zero(ty) | Constant::Undef(ty) => ty.clone(),
        }
    }

    /// Zero-extended integer payload, if this is an integer constant.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Constant::Int { value, .. } => Some(*value),
            Constant::Zero(Type::Int(_)) => Some(0),
            _ => None,
        }
    }

    /// Is this an all-zero constant (of any type)?
    pub fn is_zero(&self) -> bool {
        match self {
            Constant::Int { value, .. } => *value == 0,
            Constant::Float(bits) => *bits == 0,
            Constant::Double(bits) => *bits == 0,
            Constant::Vector(lanes) => lanes.iter().all(Constant::is_zero),
            Constant::Zero(_) => true,
            Constant::Undef(_) => false,
        }
    }

    /// Zero constant of a scalar type.
    pub fn zero_of(ty: &Type) -> Constant {
        match ty {
            Type::Int(bits) => Constant::int(*bits, 0),
            Type::Float => Constant::Float(0),
            Type::Double => Constant::Double(0),
            other => Constant::Zero(other.clone()),
        }
    }

    /// Constant in lane `index`, expanding `zeroinitializer` and `undef`.
    pub fn lane(&self, index: u32) -> Option<Constant> {
        match self {
            Constant::Vector(lanes) => lanes.get(index as usize).cloned(),
            Constant::Zero(Type::Vector(lanes, elem)) if index < *lanes => {
                Some(Constant::zero_of(elem))
            }
            Constant::Undef(Type::Vector(lanes, elem)) if index < *lanes => {
                Some(Constant::Undef((**elem).clone()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int { bits: 1, value } => {
                write!(f, "{}", if *value != 0 { "true" } else { "false" })
            }
            Constant::Int { bits, value } => write!(f, "{}", sign_extend(*bits, *value)),
            // Hex form keeps the exact bit pattern (floats widen exactly to double).
            Constant::Float(bits) => {
                write!(f, "0x{:016X}", (f32::from_bits(*bits) as f64).to_bits())
            }
            Constant::Double(bits) => write!(f, "0x{:016X}", bits),
            Constant::Vector(lanes) => {
                write!(f, "<")?;
                for (i, lane) in lanes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", lane.ty(), lane)?;
                }
                write!(f, ">")
            }
            Constant::Zero(Type::Ptr) => write!(f, "null"),
            Constant::Zero(_) => write!(f, "zeroinitializer"),
            Constant::Undef(_) => write!(f, "undef"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_is_masked() {
        assert_eq!(Constant::int(8, 0x1FF), Constant::Int { bits: 8, value: 0xFF });
        assert_eq!(Constant::int(8, 0xFF).to_string(), "-1");
        assert_eq!(Constant::int(64, 0xFFFF_FFFF).to_string(), "4294967295");
    }

    #[test]
    fn test_vector_display() {
        let v = Constant::splat(2, Constant::int(32, 0));
        assert_eq!(v.to_string(), "<i32 0, i32 0>");
        assert_eq!(v.ty(), Type::vector(2, Type::i32()));
    }

    #[test]
    fn test_lane_expansion() {
        let zero = Constant::Zero(Type::vector(4, Type::i16()));
        assert_eq!(zero.lane(3), Some(Constant::int(16, 0)));
        assert_eq!(zero.lane(4), None);
    }

    #[test]
    fn test_double_display_is_exact() {
        assert_eq!(Constant::double(1.0).to_string(), "0x3FF0000000000000");
    }
}
