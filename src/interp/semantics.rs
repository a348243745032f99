//! Reference models of the recognized intrinsics.
//!
//! Each model computes the catalog semantics directly on lane arrays,
//! independently of the instruction sequences the rules build. Operands
//! declared as reinterpreted are read through their bit image, as the
//! hardware does.
//!
//! [`hardware`] gives the unmodified hardware behavior for the intrinsics
//! whose portable lowering deviates from it.

use super::{EvalError, RtValue, Scalar};
use crate::hoist::IntrinsicKind;
use crate::ir::{FloatPredicate, Type};

fn operand<const N: usize>(kind: IntrinsicKind, args: &[RtValue]) -> Result<&[RtValue; N], EvalError> {
    args.try_into().map_err(|_| EvalError::ArgCount {
        function: kind.name().to_string(),
        expected: N,
        found: args.len(),
    })
}

/// Lane payloads of `v` read as `<lanes x i{bits}>`.
fn lanes_as(v: &RtValue, lanes: u32, bits: u32) -> Result<Vec<u64>, EvalError> {
    Ok(v.reinterpret(&Type::vector(lanes, Type::Int(bits)))?.raw_lanes())
}

/// The two `double` lanes of `v`.
fn doubles(v: &RtValue) -> Result<Vec<f64>, EvalError> {
    let lanes = v.lanes();
    if lanes.len() != 2 {
        return Err(EvalError::TypeMismatch(format!("expected <2 x double>, found {} lanes", lanes.len())));
    }
    lanes
        .iter()
        .map(|lane| match lane {
            Scalar::Double(bits) => Ok(f64::from_bits(*bits)),
            other => Err(EvalError::TypeMismatch(format!("expected double lane, found {:?}", other))),
        })
        .collect()
}

fn predicate(v: &RtValue) -> Result<FloatPredicate, EvalError> {
    match v.as_scalar() {
        Some(Scalar::Int { value: 0, .. }) => Ok(FloatPredicate::Oeq),
        Some(Scalar::Int { .. }) => Ok(FloatPredicate::Olt),
        _ => Err(EvalError::TypeMismatch("compare predicate must be an integer".into())),
    }
}

fn compare(pred: FloatPredicate, a: f64, b: f64) -> u64 {
    let holds = match pred {
        FloatPredicate::Oeq => a == b,
        _ => a < b,
    };
    if holds {
        u64::MAX
    } else {
        0
    }
}

fn shift(v: &RtValue, count: &RtValue, left: bool) -> Result<RtValue, EvalError> {
    let lanes = lanes_as(v, 2, 64)?;
    let amount = lanes_as(count, 2, 64)?[0];
    let out: Vec<u64> = lanes
        .iter()
        .map(|&x| match (amount >= 64, left) {
            (true, _) => 0,
            (false, true) => x << amount,
            (false, false) => x >> amount,
        })
        .collect();
    Ok(RtValue::ints(64, &out))
}

/// Evaluate a recognized intrinsic on concrete operands.
pub fn evaluate(kind: IntrinsicKind, args: &[RtValue]) -> Result<RtValue, EvalError> {
    match kind {
        IntrinsicKind::ShiftLeftQuad => {
            let [v, count] = operand::<2>(kind, args)?;
            shift(v, count, true)
        }
        IntrinsicKind::ShiftRightQuad => {
            let [v, count] = operand::<2>(kind, args)?;
            shift(v, count, false)
        }
        IntrinsicKind::FusedMultiplyAdd => {
            let [a, b, c] = operand::<3>(kind, args)?;
            let (a, b, c) = (doubles(a)?, doubles(b)?, doubles(c)?);
            let out: Vec<f64> = (0..2).map(|i| a[i].mul_add(b[i], c[i])).collect();
            Ok(RtValue::doubles(&out))
        }
        IntrinsicKind::Sqrt => {
            let [a] = operand::<1>(kind, args)?;
            let out: Vec<f64> = doubles(a)?.iter().map(|x| x.sqrt()).collect();
            Ok(RtValue::doubles(&out))
        }
        IntrinsicKind::SumAbsDiff => {
            let [a, b] = operand::<2>(kind, args)?;
            let (a, b) = (lanes_as(a, 16, 8)?, lanes_as(b, 16, 8)?);
            let abs: Vec<u8> = a
                .iter()
                .zip(&b)
                .map(|(&x, &y)| {
                    let diff = (x as u8).wrapping_sub(y as u8);
                    if (diff as i8) < 0 {
                        0u8.wrapping_sub(diff)
                    } else {
                        diff
                    }
                })
                .collect();
            let sums: Vec<u64> = abs
                .chunks(8)
                .map(|half| half.iter().fold(0u8, |acc, x| acc.wrapping_add(*x)) as u64)
                .collect();
            Ok(RtValue::ints(64, &sums))
        }
        IntrinsicKind::AverageWords => {
            let [a, b] = operand::<2>(kind, args)?;
            let (a, b) = (lanes_as(a, 8, 16)?, lanes_as(b, 8, 16)?);
            let out: Vec<u64> = a
                .iter()
                .zip(&b)
                .map(|(&x, &y)| ((x as u16).wrapping_add(y as u16).wrapping_add(1) >> 1) as u64)
                .collect();
            Ok(RtValue::ints(16, &out))
        }
        IntrinsicKind::MinSignedWords => {
            let [a, b] = operand::<2>(kind, args)?;
            let (a, b) = (lanes_as(a, 8, 16)?, lanes_as(b, 8, 16)?);
            let out: Vec<i64> = a
                .iter()
                .zip(&b)
                .map(|(&x, &y)| (x as u16 as i16).min(y as u16 as i16) as i64)
                .collect();
            Ok(RtValue::signed_ints(16, &out))
        }
        IntrinsicKind::ComparePacked => {
            let [a, b, p] = operand::<3>(kind, args)?;
            let pred = predicate(p)?;
            let (a, b) = (doubles(a)?, doubles(b)?);
            let lanes = (0..2).map(|i| Scalar::Double(compare(pred, a[i], b[i]))).collect();
            Ok(RtValue::Vector(lanes))
        }
        IntrinsicKind::CompareScalar => {
            let [a, b, p] = operand::<3>(kind, args)?;
            let pred = predicate(p)?;
            let (x, y) = (doubles(a)?, doubles(b)?);
            // Lane 1 passes through bit for bit, NaN payloads included.
            let lane1 = a.lanes()[1];
            Ok(RtValue::Vector(vec![Scalar::Double(compare(pred, x[0], y[0])), lane1]))
        }
        IntrinsicKind::MultiplyUnsignedDwords => {
            let [a, b] = operand::<2>(kind, args)?;
            let (a, b) = (lanes_as(a, 2, 64)?, lanes_as(b, 2, 64)?);
            let out: Vec<u64> = a
                .iter()
                .zip(&b)
                .map(|(&x, &y)| (x & 0xFFFF_FFFF) * (y & 0xFFFF_FFFF))
                .collect();
            Ok(RtValue::ints(64, &out))
        }
        IntrinsicKind::MultiplyAddWords => {
            let [a, b] = operand::<2>(kind, args)?;
            let (a, b) = (lanes_as(a, 4, 32)?, lanes_as(b, 4, 32)?);
            let out: Vec<u64> = a
                .iter()
                .zip(&b)
                .map(|(&x, &y)| {
                    let lo = (x & 0xFFFF).wrapping_mul(y & 0xFFFF);
                    let hi = ((x >> 16) & 0xFFFF).wrapping_mul((y >> 16) & 0xFFFF);
                    lo.wrapping_add(hi)
                })
                .collect();
            Ok(RtValue::ints(32, &out))
        }
        IntrinsicKind::PackUnsignedBytes => {
            let [a, b] = operand::<2>(kind, args)?;
            let mut bytes = lanes_as(a, 16, 8)?;
            bytes.extend(lanes_as(b, 16, 8)?);
            let out: Vec<u64> = bytes.iter().step_by(2).copied().collect();
            Ok(RtValue::ints(8, &out))
        }
        IntrinsicKind::MoveMaskBytes => {
            let [a] = operand::<1>(kind, args)?;
            let mask = lanes_as(a, 16, 8)?
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, byte)| acc | (((byte >> 7) & 1) << i));
            Ok(RtValue::int(32, mask))
        }
    }
}

/// Hardware behavior of the intrinsics whose lowering diverges from it.
///
/// Returns `None` for intrinsics that lower exactly.
pub fn hardware(kind: IntrinsicKind, args: &[RtValue]) -> Result<Option<RtValue>, EvalError> {
    let value = match kind {
        IntrinsicKind::PackUnsignedBytes => {
            let [a, b] = operand::<2>(kind, args)?;
            let mut words = lanes_as(a, 8, 16)?;
            words.extend(lanes_as(b, 8, 16)?);
            let out: Vec<u64> = words
                .iter()
                .map(|&w| (w as u16 as i16).clamp(0, 255) as u64)
                .collect();
            RtValue::ints(8, &out)
        }
        IntrinsicKind::MultiplyAddWords => {
            let [a, b] = operand::<2>(kind, args)?;
            let (a, b) = (lanes_as(a, 8, 16)?, lanes_as(b, 8, 16)?);
            let products: Vec<i32> = a
                .iter()
                .zip(&b)
                .map(|(&x, &y)| (x as u16 as i16 as i32) * (y as u16 as i16 as i32))
                .collect();
            let out: Vec<u64> = products
                .chunks(2)
                .map(|pair| pair[0].wrapping_add(pair[1]) as u32 as u64)
                .collect();
            RtValue::ints(32, &out)
        }
        IntrinsicKind::SumAbsDiff => {
            let [a, b] = operand::<2>(kind, args)?;
            let (a, b) = (lanes_as(a, 16, 8)?, lanes_as(b, 16, 8)?);
            let diffs: Vec<u64> = a.iter().zip(&b).map(|(&x, &y)| x.abs_diff(y)).collect();
            let sums: Vec<u64> = diffs.chunks(8).map(|half| half.iter().sum()).collect();
            RtValue::ints(64, &sums)
        }
        IntrinsicKind::AverageWords => {
            let [a, b] = operand::<2>(kind, args)?;
            let (a, b) = (lanes_as(a, 8, 16)?, lanes_as(b, 8, 16)?);
            let out: Vec<u64> = a.iter().zip(&b).map(|(&x, &y)| (x + y + 1) >> 1).collect();
            RtValue::ints(16, &out)
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(lanes: &[u64]) -> RtValue {
        RtValue::ints(16, lanes)
    }

    #[test]
    fn test_average_scenario() {
        let a = words(&[8, 7, 6, 5, 4, 3, 2, 1]);
        let b = words(&[2, 1, 4, 6, 1, 2, 3, 5]);
        let out = evaluate(IntrinsicKind::AverageWords, &[a, b]).unwrap();
        assert_eq!(out, words(&[5, 4, 5, 6, 3, 3, 3, 3]));
    }

    #[test]
    fn test_min_scenario() {
        let a = words(&[8, 7, 6, 5, 4, 3, 2, 1]);
        let b = words(&[2, 1, 4, 6, 1, 2, 3, 5]);
        let out = evaluate(IntrinsicKind::MinSignedWords, &[a, b]).unwrap();
        assert_eq!(out, words(&[2, 1, 4, 5, 1, 2, 2, 1]));
    }

    #[test]
    fn test_compare_scenario() {
        let a = RtValue::doubles(&[4.0, 3.0]);
        let b = RtValue::doubles(&[1.0, 5.0]);
        let out = evaluate(IntrinsicKind::ComparePacked, &[a, b, RtValue::int(8, 1)]).unwrap();
        assert_eq!(out.raw_lanes(), vec![0, u64::MAX]);
    }

    #[test]
    fn test_movemask_scenario() {
        let high = RtValue::ints(8, &[0x80; 16]);
        let zero = RtValue::ints(8, &[0; 16]);
        assert_eq!(
            evaluate(IntrinsicKind::MoveMaskBytes, &[high]).unwrap(),
            RtValue::int(32, 0xFFFF)
        );
        assert_eq!(evaluate(IntrinsicKind::MoveMaskBytes, &[zero]).unwrap(), RtValue::int(32, 0));
    }

    #[test]
    fn test_sad_identical_inputs() {
        let v = RtValue::ints(8, &(0..16).map(|i| i * 13).collect::<Vec<_>>());
        let out = evaluate(IntrinsicKind::SumAbsDiff, &[v.clone(), v]).unwrap();
        assert_eq!(out, RtValue::ints(64, &[0, 0]));
    }

    #[test]
    fn test_shift_count_from_lane0() {
        let v = RtValue::ints(64, &[1, 3]);
        let count = RtValue::ints(64, &[4, 60]);
        assert_eq!(
            evaluate(IntrinsicKind::ShiftLeftQuad, &[v.clone(), count]).unwrap(),
            RtValue::ints(64, &[16, 48])
        );
        let huge = RtValue::ints(64, &[64, 0]);
        assert_eq!(
            evaluate(IntrinsicKind::ShiftRightQuad, &[v, huge]).unwrap(),
            RtValue::ints(64, &[0, 0])
        );
    }

    #[test]
    fn test_hardware_divergence() {
        // 300 saturates to 255 on hardware, truncates to 44 when lowered.
        let a = words(&[300, 0, 0, 0, 0, 0, 0, 0]);
        let b = words(&[0; 8]);
        let lowered = evaluate(IntrinsicKind::PackUnsignedBytes, &[a.clone(), b.clone()]).unwrap();
        let exact = hardware(IntrinsicKind::PackUnsignedBytes, &[a, b]).unwrap().unwrap();
        assert_eq!(lowered.raw_lanes()[0], 44);
        assert_eq!(exact.raw_lanes()[0], 255);

        let max = words(&[0xFFFF; 8]);
        let lowered = evaluate(IntrinsicKind::AverageWords, &[max.clone(), max.clone()]).unwrap();
        let exact = hardware(IntrinsicKind::AverageWords, &[max.clone(), max]).unwrap().unwrap();
        assert_eq!(lowered.raw_lanes()[0], 0x7FFF);
        assert_eq!(exact.raw_lanes()[0], 0xFFFF);

        assert_eq!(hardware(IntrinsicKind::Sqrt, &[]).unwrap(), None);
    }

    #[test]
    fn test_divergent_kinds_match_catalog() {
        let probe = RtValue::ints(8, &[0x80; 16]);
        for kind in IntrinsicKind::ALL {
            let args = vec![probe.clone(); kind.operands().len().min(2)];
            let has_model = matches!(hardware(kind, &args), Ok(Some(_)));
            assert_eq!(has_model, kind.diverges_from_hardware(), "{}", kind);
        }
    }
}
