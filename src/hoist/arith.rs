//! Lane-wise integer arithmetic rules.

use super::{operands, RuleError};
use crate::ir::{Builder, Constant, IntPredicate, Type, Value};

fn splat_int(b: &mut Builder<'_>, lanes: u32, bits: u32, value: u64, name: &str) -> Value {
    b.splat(lanes, Value::Const(Constant::int(bits, value)), name)
}

/// `llvm.x86.sse2.pavg.w`: `(a + b + 1) >> 1` on 16-bit lanes.
///
/// The intermediate sum stays 16 bits wide, so it wraps where the hardware
/// keeps a carry bit.
pub fn average_words(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    let [x, y] = operands::<2>(args)?;
    let sum = b.add(x.clone(), y.clone(), "sum");
    let one = splat_int(b, 8, 16, 1, "one");
    let rounded = b.add(sum, one.clone(), "sum.round");
    Ok(b.lshr(rounded, one, "avg"))
}

/// `llvm.x86.sse2.pmins.w`: `select(a < b, a, b)` with a signed compare.
pub fn min_signed_words(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    let [x, y] = operands::<2>(args)?;
    let less = b.icmp(IntPredicate::Slt, x.clone(), y.clone(), "less");
    Ok(b.select(less, x.clone(), y.clone(), "min"))
}

/// `llvm.x86.sse2.pmulu.dq`: multiply the low 32 bits of each 64-bit lane.
pub fn multiply_unsigned_dwords(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    let [x, y] = operands::<2>(args)?;
    let v2i64 = Type::vector(2, Type::i64());
    let wide_x = b.bitcast(x.clone(), v2i64.clone(), "wide.x");
    let wide_y = b.bitcast(y.clone(), v2i64, "wide.y");
    let low = splat_int(b, 2, 64, 0xFFFF_FFFF, "low32");
    let lo_x = b.and(wide_x, low.clone(), "lo.x");
    let lo_y = b.and(wide_y, low, "lo.y");
    Ok(b.mul(lo_x, lo_y, "product"))
}

/// `llvm.x86.sse2.pmadd.wd`: per 32-bit lane, `lo(a)*lo(b) + hi(a)*hi(b)`.
///
/// Both 16-bit halves are masked rather than sign-extended, so the products
/// are unsigned.
pub fn multiply_add_words(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    let [x, y] = operands::<2>(args)?;
    let v4i32 = Type::vector(4, Type::i32());
    let pairs_x = b.bitcast(x.clone(), v4i32.clone(), "pairs.x");
    let pairs_y = b.bitcast(y.clone(), v4i32, "pairs.y");
    let low = splat_int(b, 4, 32, 0xFFFF, "low16");

    let lo_x = b.and(pairs_x.clone(), low.clone(), "lo.x");
    let lo_y = b.and(pairs_y.clone(), low.clone(), "lo.y");
    let lo_product = b.mul(lo_x, lo_y, "lo.product");

    let sixteen = splat_int(b, 4, 32, 16, "sixteen");
    let shifted_x = b.lshr(pairs_x, sixteen.clone(), "hi.x.shifted");
    let shifted_y = b.lshr(pairs_y, sixteen, "hi.y.shifted");
    let hi_x = b.and(shifted_x, low.clone(), "hi.x");
    let hi_y = b.and(shifted_y, low, "hi.y");
    let hi_product = b.mul(hi_x, hi_y, "hi.product");

    Ok(b.add(lo_product, hi_product, "madd"))
}
