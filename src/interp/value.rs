//! Runtime values.

use super::EvalError;
use crate::ir::constant::{mask_to, sign_extend};
use crate::ir::{Constant, Type};

/// One lane (or a scalar). Floats keep their raw bits so equality is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Int { bits: u32, value: u64 },
    Float(u32),
    Double(u64),
}

impl Scalar {
    pub fn int(bits: u32, value: u64) -> Self {
        Scalar::Int { bits, value: mask_to(bits, value) }
    }

    pub fn bool(value: bool) -> Self {
        Scalar::Int { bits: 1, value: value as u64 }
    }

    pub fn double(value: f64) -> Self {
        Scalar::Double(value.to_bits())
    }

    pub fn float(value: f32) -> Self {
        Scalar::Float(value.to_bits())
    }

    /// Zero of a scalar type.
    pub fn zero(ty: &Type) -> Result<Self, EvalError> {
        Self::from_raw(ty, 0)
    }

    /// Scalar of type `ty` from the low bits of `raw`.
    pub fn from_raw(ty: &Type, raw: u64) -> Result<Self, EvalError> {
        match ty {
            Type::Int(bits) if *bits <= 64 => Ok(Scalar::int(*bits, raw)),
            Type::Ptr => Ok(Scalar::int(64, raw)),
            Type::Float => Ok(Scalar::Float(raw as u32)),
            Type::Double => Ok(Scalar::Double(raw)),
            other => Err(EvalError::Unsupported(format!("scalar of type {}", other))),
        }
    }

    /// Width in bits.
    pub fn width(&self) -> u32 {
        match self {
            Scalar::Int { bits, .. } => *bits,
            Scalar::Float(_) => 32,
            Scalar::Double(_) => 64,
        }
    }

    /// Raw bit pattern, zero-extended.
    pub fn raw(&self) -> u64 {
        match self {
            Scalar::Int { value, .. } => *value,
            Scalar::Float(bits) => *bits as u64,
            Scalar::Double(bits) => *bits,
        }
    }

    /// Integer payload sign-extended from its width.
    pub fn signed(&self) -> i64 {
        sign_extend(self.width(), self.raw())
    }

    /// Floating-point value, widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(bits) => Some(f32::from_bits(*bits) as f64),
            Scalar::Double(bits) => Some(f64::from_bits(*bits)),
            Scalar::Int { .. } => None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.raw() & 1 != 0
    }
}

/// A value produced by evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RtValue {
    Void,
    Scalar(Scalar),
    Vector(Vec<Scalar>),
}

impl RtValue {
    pub fn int(bits: u32, value: u64) -> Self {
        RtValue::Scalar(Scalar::int(bits, value))
    }

    pub fn double(value: f64) -> Self {
        RtValue::Scalar(Scalar::double(value))
    }

    /// Integer vector from lane payloads (lane 0 first).
    pub fn ints(bits: u32, lanes: &[u64]) -> Self {
        RtValue::Vector(lanes.iter().map(|&v| Scalar::int(bits, v)).collect())
    }

    /// Integer vector from signed lane values.
    pub fn signed_ints(bits: u32, lanes: &[i64]) -> Self {
        RtValue::Vector(lanes.iter().map(|&v| Scalar::int(bits, v as u64)).collect())
    }

    pub fn doubles(lanes: &[f64]) -> Self {
        RtValue::Vector(lanes.iter().map(|&v| Scalar::double(v)).collect())
    }

    /// Zero of any first-class type.
    pub fn zero(ty: &Type) -> Result<Self, EvalError> {
        match ty {
            Type::Void => Ok(RtValue::Void),
            Type::Vector(lanes, elem) => {
                let lane = Scalar::zero(elem)?;
                Ok(RtValue::Vector(vec![lane; *lanes as usize]))
            }
            scalar => Scalar::zero(scalar).map(RtValue::Scalar),
        }
    }

    /// Value of a constant. `undef` evaluates to zero.
    pub fn from_constant(c: &Constant) -> Result<Self, EvalError> {
        match c {
            Constant::Int { bits, value } => Ok(RtValue::int(*bits, *value)),
            Constant::Float(bits) => Ok(RtValue::Scalar(Scalar::Float(*bits))),
            Constant::Double(bits) => Ok(RtValue::Scalar(Scalar::Double(*bits))),
            Constant::Vector(lanes) => {
                let lanes = lanes
                    .iter()
                    .map(|lane| match RtValue::from_constant(lane)? {
                        RtValue::Scalar(s) => Ok(s),
                        _ => Err(EvalError::Unsupported("nested vector constant".into())),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(RtValue::Vector(lanes))
            }
            Constant::Zero(ty) | Constant::Undef(ty) => RtValue::zero(ty),
        }
    }

    /// Lanes of a vector, or the scalar as a single lane.
    pub fn lanes(&self) -> Vec<Scalar> {
        match self {
            RtValue::Void => Vec::new(),
            RtValue::Scalar(s) => vec![*s],
            RtValue::Vector(lanes) => lanes.clone(),
        }
    }

    /// Raw lane payloads.
    pub fn raw_lanes(&self) -> Vec<u64> {
        self.lanes().iter().map(Scalar::raw).collect()
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            RtValue::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// Little-endian bit image: lane 0 occupies the lowest bits.
    pub fn to_bits(&self) -> Vec<bool> {
        let mut bits = Vec::new();
        for lane in self.lanes() {
            let raw = lane.raw();
            bits.extend((0..lane.width()).map(|i| (raw >> i) & 1 != 0));
        }
        bits
    }

    /// Reassemble a bit image as a value of type `ty`.
    pub fn from_bits(bits: &[bool], ty: &Type) -> Result<Self, EvalError> {
        if bits.len() as u32 != ty.bit_width() {
            return Err(EvalError::TypeMismatch(format!(
                "cannot reinterpret {} bits as {}",
                bits.len(),
                ty
            )));
        }
        let lane_of = |chunk: &[bool], elem: &Type| {
            let raw = chunk
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, bit)| acc | ((*bit as u64) << i));
            Scalar::from_raw(elem, raw)
        };
        match ty {
            Type::Vector(_, elem) => {
                let width = elem.scalar_bits() as usize;
                let lanes = bits
                    .chunks(width)
                    .map(|chunk| lane_of(chunk, &**elem))
                    .collect::<Result<_, _>>()?;
                Ok(RtValue::Vector(lanes))
            }
            scalar => lane_of(bits, scalar).map(RtValue::Scalar),
        }
    }

    /// Bitcast to `ty`.
    pub fn reinterpret(&self, ty: &Type) -> Result<Self, EvalError> {
        RtValue::from_bits(&self.to_bits(), ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_lanes_pack_into_integer() {
        let mut lanes = vec![Scalar::bool(false); 16];
        lanes[0] = Scalar::bool(true);
        lanes[15] = Scalar::bool(true);
        let packed = RtValue::Vector(lanes).reinterpret(&Type::i16()).unwrap();
        assert_eq!(packed, RtValue::int(16, 0x8001));
    }

    #[test]
    fn test_reinterpret_is_little_endian() {
        let words = RtValue::ints(16, &[0x0201, 0x0403, 0, 0, 0, 0, 0, 0]);
        let bytes = words.reinterpret(&Type::vector(16, Type::i8())).unwrap();
        assert_eq!(&bytes.raw_lanes()[..4], &[1, 2, 3, 4]);

        let back = bytes.reinterpret(&Type::vector(8, Type::i16())).unwrap();
        assert_eq!(back, words);
    }

    #[test]
    fn test_reinterpret_width_mismatch() {
        let v = RtValue::ints(8, &[1, 2]);
        assert!(v.reinterpret(&Type::i32()).is_err());
    }

    #[test]
    fn test_undef_is_zero() {
        let ty = Type::vector(2, Type::Double);
        let v = RtValue::from_constant(&Constant::Undef(ty)).unwrap();
        assert_eq!(v, RtValue::doubles(&[0.0, 0.0]));
    }
}
