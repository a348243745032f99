//! Quadword shifts by a vector count (`psllq`, `psrlq`).
//!
//! The hardware shifts both lanes by the count held in lane 0 of the second
//! operand. The count is broadcast with a zero shuffle mask and the shift
//! becomes a plain lane-wise `shl` / `lshr`.

use super::{operands, RuleError};
use crate::ir::{BinOp, Builder, Value};

fn shift_by_lane0(b: &mut Builder<'_>, args: &[Value], op: BinOp) -> Result<Value, RuleError> {
    let [v, count] = operands::<2>(args)?;
    let count = b.shuffle_lanes(count.clone(), &[0, 0], "count");
    Ok(b.binary(op, v.clone(), count, op.mnemonic()))
}

/// `llvm.x86.sse2.psll.q`
pub fn shift_left_quad(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    shift_by_lane0(b, args, BinOp::Shl)
}

/// `llvm.x86.sse2.psrl.q`
pub fn shift_right_quad(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    shift_by_lane0(b, args, BinOp::LShr)
}
