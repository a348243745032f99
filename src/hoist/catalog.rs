//! Recognized intrinsics.
//!
//! A closed catalog: every entry is keyed by its exact LLVM name and maps to
//! one lowering rule. Lookup never matches on prefixes.

use super::{arith, compare, math, pack, reduce, shift, RuleError};
use crate::ir::{Builder, Constant, Signature, Type, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name prefix of target-specific intrinsics. Only used for diagnostics.
pub const TARGET_PREFIX: &str = "llvm.x86.";

/// A lowering rule: builds the replacement before the call and returns it.
pub type Rule = fn(&mut Builder<'_>, &[Value]) -> Result<Value, RuleError>;

/// Intrinsics with a portable lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntrinsicKind {
    /// llvm.x86.sse2.psll.q
    ShiftLeftQuad,
    /// llvm.x86.sse2.psrl.q
    ShiftRightQuad,
    /// llvm.x86.fma.vfmadd.pd
    FusedMultiplyAdd,
    /// llvm.x86.sse2.sqrt.pd
    Sqrt,
    /// llvm.x86.sse2.psad.bw
    SumAbsDiff,
    /// llvm.x86.sse2.pavg.w
    AverageWords,
    /// llvm.x86.sse2.pmins.w
    MinSignedWords,
    /// llvm.x86.sse2.cmp.pd
    ComparePacked,
    /// llvm.x86.sse2.cmp.sd
    CompareScalar,
    /// llvm.x86.sse2.pmulu.dq
    MultiplyUnsignedDwords,
    /// llvm.x86.sse2.pmadd.wd
    MultiplyAddWords,
    /// llvm.x86.sse2.packuswb.128
    PackUnsignedBytes,
    /// llvm.x86.sse2.pmovmskb.128
    MoveMaskBytes,
}

/// How a rule constrains one operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandClass {
    /// Exactly this type
    Exact(Type),
    /// Any 128-bit integer vector; the type is the declared one
    Reinterpreted(Type),
    /// Integer scalar that must be a compile-time constant
    Predicate,
}

impl OperandClass {
    /// Type used when declaring the intrinsic.
    pub fn declared_type(&self) -> Type {
        match self {
            OperandClass::Exact(ty) | OperandClass::Reinterpreted(ty) => ty.clone(),
            OperandClass::Predicate => Type::i8(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown intrinsic '{0}'")]
pub struct UnknownIntrinsic(pub String);

fn v(lanes: u32, elem: Type) -> Type {
    Type::vector(lanes, elem)
}

impl IntrinsicKind {
    pub const ALL: [IntrinsicKind; 13] = [
        IntrinsicKind::ShiftLeftQuad,
        IntrinsicKind::ShiftRightQuad,
        IntrinsicKind::FusedMultiplyAdd,
        IntrinsicKind::Sqrt,
        IntrinsicKind::SumAbsDiff,
        IntrinsicKind::AverageWords,
        IntrinsicKind::MinSignedWords,
        IntrinsicKind::ComparePacked,
        IntrinsicKind::CompareScalar,
        IntrinsicKind::MultiplyUnsignedDwords,
        IntrinsicKind::MultiplyAddWords,
        IntrinsicKind::PackUnsignedBytes,
        IntrinsicKind::MoveMaskBytes,
    ];

    /// Look up a callee name. Only exact names match.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "llvm.x86.sse2.psll.q" => IntrinsicKind::ShiftLeftQuad,
            "llvm.x86.sse2.psrl.q" => IntrinsicKind::ShiftRightQuad,
            "llvm.x86.fma.vfmadd.pd" => IntrinsicKind::FusedMultiplyAdd,
            "llvm.x86.sse2.sqrt.pd" => IntrinsicKind::Sqrt,
            "llvm.x86.sse2.psad.bw" => IntrinsicKind::SumAbsDiff,
            "llvm.x86.sse2.pavg.w" => IntrinsicKind::AverageWords,
            "llvm.x86.sse2.pmins.w" => IntrinsicKind::MinSignedWords,
            "llvm.x86.sse2.cmp.pd" => IntrinsicKind::ComparePacked,
            "llvm.x86.sse2.cmp.sd" => IntrinsicKind::CompareScalar,
            "llvm.x86.sse2.pmulu.dq" => IntrinsicKind::MultiplyUnsignedDwords,
            "llvm.x86.sse2.pmadd.wd" => IntrinsicKind::MultiplyAddWords,
            "llvm.x86.sse2.packuswb.128" => IntrinsicKind::PackUnsignedBytes,
            "llvm.x86.sse2.pmovmskb.128" => IntrinsicKind::MoveMaskBytes,
            _ => return None,
        })
    }

    /// LLVM intrinsic name.
    pub fn name(self) -> &'static str {
        match self {
            IntrinsicKind::ShiftLeftQuad => "llvm.x86.sse2.psll.q",
            IntrinsicKind::ShiftRightQuad => "llvm.x86.sse2.psrl.q",
            IntrinsicKind::FusedMultiplyAdd => "llvm.x86.fma.vfmadd.pd",
            IntrinsicKind::Sqrt => "llvm.x86.sse2.sqrt.pd",
            IntrinsicKind::SumAbsDiff => "llvm.x86.sse2.psad.bw",
            IntrinsicKind::AverageWords => "llvm.x86.sse2.pavg.w",
            IntrinsicKind::MinSignedWords => "llvm.x86.sse2.pmins.w",
            IntrinsicKind::ComparePacked => "llvm.x86.sse2.cmp.pd",
            IntrinsicKind::CompareScalar => "llvm.x86.sse2.cmp.sd",
            IntrinsicKind::MultiplyUnsignedDwords => "llvm.x86.sse2.pmulu.dq",
            IntrinsicKind::MultiplyAddWords => "llvm.x86.sse2.pmadd.wd",
            IntrinsicKind::PackUnsignedBytes => "llvm.x86.sse2.packuswb.128",
            IntrinsicKind::MoveMaskBytes => "llvm.x86.sse2.pmovmskb.128",
        }
    }

    /// Short identifier used in configuration files and on the command line.
    pub fn id(self) -> &'static str {
        match self {
            IntrinsicKind::ShiftLeftQuad => "shift-left-quad",
            IntrinsicKind::ShiftRightQuad => "shift-right-quad",
            IntrinsicKind::FusedMultiplyAdd => "fused-multiply-add",
            IntrinsicKind::Sqrt => "sqrt",
            IntrinsicKind::SumAbsDiff => "sum-abs-diff",
            IntrinsicKind::AverageWords => "average-words",
            IntrinsicKind::MinSignedWords => "min-signed-words",
            IntrinsicKind::ComparePacked => "compare-packed",
            IntrinsicKind::CompareScalar => "compare-scalar",
            IntrinsicKind::MultiplyUnsignedDwords => "multiply-unsigned-dwords",
            IntrinsicKind::MultiplyAddWords => "multiply-add-words",
            IntrinsicKind::PackUnsignedBytes => "pack-unsigned-bytes",
            IntrinsicKind::MoveMaskBytes => "move-mask-bytes",
        }
    }

    /// The lowering rule for this intrinsic.
    pub fn rule(self) -> Rule {
        match self {
            IntrinsicKind::ShiftLeftQuad => shift::shift_left_quad,
            IntrinsicKind::ShiftRightQuad => shift::shift_right_quad,
            IntrinsicKind::FusedMultiplyAdd => math::fused_multiply_add,
            IntrinsicKind::Sqrt => math::sqrt,
            IntrinsicKind::SumAbsDiff => reduce::sum_abs_diff,
            IntrinsicKind::AverageWords => arith::average_words,
            IntrinsicKind::MinSignedWords => arith::min_signed_words,
            IntrinsicKind::ComparePacked => compare::compare_packed,
            IntrinsicKind::CompareScalar => compare::compare_scalar,
            IntrinsicKind::MultiplyUnsignedDwords => arith::multiply_unsigned_dwords,
            IntrinsicKind::MultiplyAddWords => arith::multiply_add_words,
            IntrinsicKind::PackUnsignedBytes => pack::pack_unsigned_bytes,
            IntrinsicKind::MoveMaskBytes => pack::move_mask_bytes,
        }
    }

    /// Operand constraints, in call order.
    pub fn operands(self) -> Vec<OperandClass> {
        use OperandClass::*;
        let v2i64 = || Exact(v(2, Type::i64()));
        let v2f64 = || Exact(v(2, Type::Double));
        let v16i8 = || Exact(v(16, Type::i8()));
        let v8i16 = || Exact(v(8, Type::i16()));
        match self {
            IntrinsicKind::ShiftLeftQuad | IntrinsicKind::ShiftRightQuad => vec![v2i64(), v2i64()],
            IntrinsicKind::FusedMultiplyAdd => vec![v2f64(), v2f64(), v2f64()],
            IntrinsicKind::Sqrt => vec![v2f64()],
            IntrinsicKind::SumAbsDiff => vec![v16i8(), v16i8()],
            IntrinsicKind::AverageWords | IntrinsicKind::MinSignedWords => vec![v8i16(), v8i16()],
            IntrinsicKind::ComparePacked | IntrinsicKind::CompareScalar => {
                vec![v2f64(), v2f64(), Predicate]
            }
            IntrinsicKind::MultiplyUnsignedDwords => vec![
                Reinterpreted(v(4, Type::i32())),
                Reinterpreted(v(4, Type::i32())),
            ],
            IntrinsicKind::MultiplyAddWords | IntrinsicKind::PackUnsignedBytes => vec![
                Reinterpreted(v(8, Type::i16())),
                Reinterpreted(v(8, Type::i16())),
            ],
            IntrinsicKind::MoveMaskBytes => vec![v16i8()],
        }
    }

    /// Result type of the intrinsic call.
    pub fn result_type(self) -> Type {
        match self {
            IntrinsicKind::ShiftLeftQuad
            | IntrinsicKind::ShiftRightQuad
            | IntrinsicKind::SumAbsDiff
            | IntrinsicKind::MultiplyUnsignedDwords => v(2, Type::i64()),
            IntrinsicKind::FusedMultiplyAdd
            | IntrinsicKind::Sqrt
            | IntrinsicKind::ComparePacked
            | IntrinsicKind::CompareScalar => v(2, Type::Double),
            IntrinsicKind::AverageWords | IntrinsicKind::MinSignedWords => v(8, Type::i16()),
            IntrinsicKind::MultiplyAddWords => v(4, Type::i32()),
            IntrinsicKind::PackUnsignedBytes => v(16, Type::i8()),
            IntrinsicKind::MoveMaskBytes => Type::i32(),
        }
    }

    /// Declaration signature, as LLVM declares the intrinsic.
    pub fn signature(self) -> Signature {
        let params = self.operands().iter().map(OperandClass::declared_type).collect();
        Signature::new(self.result_type(), params)
    }

    /// Does the lowered form differ from the hardware instruction on some inputs?
    ///
    /// `pack-unsigned-bytes` does not saturate, `multiply-add-words` multiplies
    /// unsigned halves, `sum-abs-diff` accumulates in 8 bits and
    /// `average-words` wraps the 16-bit intermediate sum.
    pub fn diverges_from_hardware(self) -> bool {
        matches!(
            self,
            IntrinsicKind::PackUnsignedBytes
                | IntrinsicKind::MultiplyAddWords
                | IntrinsicKind::SumAbsDiff
                | IntrinsicKind::AverageWords
        )
    }

    /// Check a call's operands and result type against this intrinsic.
    ///
    /// Runs before the rule inserts anything.
    pub fn validate(self, b: &Builder<'_>, args: &[Value], result: &Type) -> Result<(), RuleError> {
        let classes = self.operands();
        if args.len() != classes.len() {
            return Err(RuleError::OperandCount {
                expected: classes.len(),
                found: args.len(),
            });
        }

        for (index, (arg, class)) in args.iter().zip(&classes).enumerate() {
            let ty = b.type_of(arg);
            match class {
                OperandClass::Exact(expected) if ty != *expected => {
                    return Err(RuleError::OperandType {
                        index,
                        expected: expected.to_string(),
                        found: ty,
                    });
                }
                OperandClass::Reinterpreted(_)
                    if !(ty.is_vector() && ty.is_int_or_int_vector() && ty.bit_width() == 128) =>
                {
                    return Err(RuleError::OperandType {
                        index,
                        expected: "128-bit integer vector".to_string(),
                        found: ty,
                    });
                }
                OperandClass::Predicate => {
                    if !matches!(ty, Type::Int(_)) {
                        return Err(RuleError::OperandType {
                            index,
                            expected: "integer predicate".to_string(),
                            found: ty,
                        });
                    }
                    if arg.as_const().and_then(Constant::as_u64).is_none() {
                        return Err(RuleError::NonConstantPredicate { index });
                    }
                }
                _ => {}
            }
        }

        let expected = self.result_type();
        if *result != expected {
            return Err(RuleError::ResultType { expected, found: result.clone() });
        }
        Ok(())
    }
}

impl fmt::Display for IntrinsicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for IntrinsicKind {
    type Err = UnknownIntrinsic;

    /// Accepts either the short id or the full LLVM name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntrinsicKind::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .or_else(|| IntrinsicKind::from_name(s))
            .ok_or_else(|| UnknownIntrinsic(s.to_string()))
    }
}
