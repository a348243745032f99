//! Predicated double-precision compares (`cmppd`, `cmpsd`).
//!
//! The third operand selects the relation: zero is ordered equality, any
//! other value is ordered less-than. True lanes become all-ones bit
//! patterns reinterpreted as doubles.

use super::{operands, RuleError};
use crate::ir::{Builder, Constant, FloatPredicate, Type, Value};

/// Relation selected by a compare predicate operand.
pub fn predicate_of(value: &Value, index: usize) -> Result<FloatPredicate, RuleError> {
    match value.as_const().and_then(Constant::as_u64) {
        Some(0) => Ok(FloatPredicate::Oeq),
        Some(_) => Ok(FloatPredicate::Olt),
        None => Err(RuleError::NonConstantPredicate { index }),
    }
}

/// `llvm.x86.sse2.cmp.pd`
pub fn compare_packed(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    let [x, y, predicate] = operands::<3>(args)?;
    let pred = predicate_of(predicate, 2)?;

    let cmp = b.fcmp(pred, x.clone(), y.clone(), "cmp");
    let mask = b.sext(cmp, Type::vector(2, Type::i64()), "cmp.mask");
    Ok(b.bitcast(mask, Type::vector(2, Type::Double), "cmp.result"))
}

/// `llvm.x86.sse2.cmp.sd`: compare lane 0 only; lane 1 passes through from `a`.
pub fn compare_scalar(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    let [x, y, predicate] = operands::<3>(args)?;
    let pred = predicate_of(predicate, 2)?;

    let x0 = b.extract(x.clone(), 0, "x0");
    let y0 = b.extract(y.clone(), 0, "y0");
    let cmp = b.fcmp(pred, x0, y0, "cmp");
    let mask = b.sext(cmp, Type::i64(), "cmp.mask");
    let lane0 = b.bitcast(mask, Type::Double, "lane0");
    let lane1 = b.extract(x.clone(), 1, "lane1");

    let undef = Value::undef(Type::vector(2, Type::Double));
    let partial = b.insert(undef, lane0, 0, "cmp.partial");
    Ok(b.insert(partial, lane1, 1, "cmp.result"))
}
