//! `psadbw`: sum of absolute byte differences.
//!
//! Each 8-byte half of `|a - b|` is folded pairwise (8 → 4 → 2 → 1) and the
//! sum is widened to a 64-bit lane. Bytes are subtracted and accumulated in
//! 8 bits, so sums above 255 and differences above 127 wrap.

use super::{operands, RuleError};
use crate::ir::{Builder, Constant, IntPredicate, Type, Value};

/// Absolute lane-wise difference, `select(d < 0, 0 - d, d)`.
fn abs_diff(b: &mut Builder<'_>, x: Value, y: Value) -> Value {
    let diff = b.sub(x, y, "diff");
    let zero = Value::Const(Constant::splat(16, Constant::int(8, 0)));
    let neg = b.sub(zero.clone(), diff.clone(), "diff.neg");
    let negative = b.icmp(IntPredicate::Slt, diff.clone(), zero, "diff.isneg");
    b.select(negative, neg, diff, "absdiff")
}

/// Sum the lanes of an 8-lane vector by repeated halving.
fn horizontal_sum(b: &mut Builder<'_>, half: Value, name: &str) -> Value {
    let lo = b.shuffle_lanes(half.clone(), &[0, 1, 2, 3], &format!("{}.lo4", name));
    let hi = b.shuffle_lanes(half, &[4, 5, 6, 7], &format!("{}.hi4", name));
    let quad = b.add(lo, hi, &format!("{}.sum4", name));

    let lo = b.shuffle_lanes(quad.clone(), &[0, 1], &format!("{}.lo2", name));
    let hi = b.shuffle_lanes(quad, &[2, 3], &format!("{}.hi2", name));
    let pair = b.add(lo, hi, &format!("{}.sum2", name));

    let first = b.extract(pair.clone(), 0, &format!("{}.e0", name));
    let second = b.extract(pair, 1, &format!("{}.e1", name));
    let sum = b.add(first, second, &format!("{}.sum", name));
    b.zext(sum, Type::i64(), &format!("{}.wide", name))
}

/// `llvm.x86.sse2.psad.bw`
pub fn sum_abs_diff(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    let [x, y] = operands::<2>(args)?;
    let abs = abs_diff(b, x.clone(), y.clone());

    let lo = b.shuffle_lanes(abs.clone(), &[0, 1, 2, 3, 4, 5, 6, 7], "lo");
    let hi = b.shuffle_lanes(abs, &[8, 9, 10, 11, 12, 13, 14, 15], "hi");
    let lo_sum = horizontal_sum(b, lo, "lo");
    let hi_sum = horizontal_sum(b, hi, "hi");

    let undef = Value::undef(Type::vector(2, Type::i64()));
    let partial = b.insert(undef, lo_sum, 0, "sad.partial");
    Ok(b.insert(partial, hi_sum, 1, "sad"))
}
