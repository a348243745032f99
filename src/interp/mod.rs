//! Reference interpreter.
//!
//! Evaluates functions of a [`Module`] on concrete values. Used to check
//! that a lowered function computes the same lanes as the original one.
//!
//! Calls to defined functions are interpreted. Calls to recognized target
//! intrinsics use the models in [`semantics`]; `llvm.fma.*` and
//! `llvm.sqrt.*` use IEEE fused multiply-add and square root.
//!
//! Shift amounts of at least the lane width produce zero (`shl`, `lshr`)
//! or a sign fill (`ashr`) instead of poison. `undef` is zero.

pub mod semantics;
mod value;

pub use value::{RtValue, Scalar};

use crate::hoist::IntrinsicKind;
use crate::ir::constant::{mask_to, sign_extend};
use crate::ir::{
    BinOp, Callee, CastOp, FloatPredicate, Function, InstId, InstKind, Instruction, IntPredicate,
    Module, Type, Value,
};
use std::collections::HashMap;
use thiserror::Error;

/// Instructions executed before giving up.
pub const DEFAULT_FUEL: u64 = 1_000_000;

/// Maximum nesting of interpreted calls.
pub const MAX_CALL_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown function @{0}")]
    UnknownFunction(String),

    #[error("@{function}: expected {expected} arguments, found {found}")]
    ArgCount {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("@{0} has no body")]
    NoBody(String),

    #[error("@{function}: no block named '{block}'")]
    MissingBlock { function: String, block: String },

    #[error("@{function}: block '{block}' has no terminator")]
    FellOffBlock { function: String, block: String },

    #[error("use of {0:?} before it was computed")]
    Unevaluated(InstId),

    #[error("argument {0} out of range")]
    ArgOutOfRange(u32),

    #[error("lane index {index} out of range for {lanes} lanes")]
    IndexOutOfRange { index: u64, lanes: usize },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("out of fuel")]
    OutOfFuel,

    #[error("call depth limit exceeded")]
    CallDepth,
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Evaluator over one module.
pub struct Interpreter<'m> {
    module: &'m Module,
    fuel: u64,
    depth: usize,
}

impl<'m> Interpreter<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self::with_fuel(module, DEFAULT_FUEL)
    }

    pub fn with_fuel(module: &'m Module, fuel: u64) -> Self {
        Self { module, fuel, depth: 0 }
    }

    /// Call a function (defined or external) by name.
    pub fn call(&mut self, name: &str, args: &[RtValue]) -> EvalResult<RtValue> {
        let module = self.module;
        match module.function(name) {
            Some(func) => self.run_function(func, args),
            None => call_external(name, args),
        }
    }

    fn consume_fuel(&mut self) -> EvalResult<()> {
        if self.fuel == 0 {
            return Err(EvalError::OutOfFuel);
        }
        self.fuel -= 1;
        Ok(())
    }

    fn run_function(&mut self, func: &'m Function, args: &[RtValue]) -> EvalResult<RtValue> {
        if args.len() != func.params.len() {
            return Err(EvalError::ArgCount {
                function: func.name.clone(),
                expected: func.params.len(),
                found: args.len(),
            });
        }
        let entry = func
            .entry_block()
            .ok_or_else(|| EvalError::NoBody(func.name.clone()))?;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::CallDepth);
        }

        self.depth += 1;
        let result = self.run_body(func, entry.label().to_string(), args);
        self.depth -= 1;
        result
    }

    fn run_body(&mut self, func: &'m Function, mut label: String, args: &[RtValue]) -> EvalResult<RtValue> {
        let mut frame = Frame { func, args, values: HashMap::new() };

        loop {
            let block = func.block(&label).ok_or_else(|| EvalError::MissingBlock {
                function: func.name.clone(),
                block: label.clone(),
            })?;

            let mut next = None;
            for id in block.iter() {
                self.consume_fuel()?;
                let inst = func.inst(id).ok_or(EvalError::Unevaluated(id))?;
                match &inst.kind {
                    InstKind::Br { target } => {
                        next = Some(target.clone());
                        break;
                    }
                    InstKind::CondBr { cond, then_dest, else_dest } => {
                        let taken = match frame.operand(cond)?.as_scalar() {
                            Some(s) => s.is_true(),
                            None => return Err(EvalError::TypeMismatch("branch on a vector".into())),
                        };
                        next = Some(if taken { then_dest.clone() } else { else_dest.clone() });
                        break;
                    }
                    InstKind::Ret { value } => {
                        return match value {
                            Some(v) => frame.operand(v),
                            None => Ok(RtValue::Void),
                        };
                    }
                    _ => {
                        let value = self.eval(&frame, inst)?;
                        frame.values.insert(id, value);
                    }
                }
            }

            label = next.ok_or_else(|| EvalError::FellOffBlock {
                function: func.name.clone(),
                block: label.clone(),
            })?;
        }
    }

    fn eval(&mut self, frame: &Frame<'_>, inst: &Instruction) -> EvalResult<RtValue> {
        match &inst.kind {
            InstKind::Binary { op, lhs, rhs } => {
                let (a, b) = (frame.operand(lhs)?, frame.operand(rhs)?);
                zip_lanes(&a, &b, |x, y| binary(*op, x, y))
            }
            InstKind::ICmp { pred, lhs, rhs } => {
                let (a, b) = (frame.operand(lhs)?, frame.operand(rhs)?);
                zip_lanes(&a, &b, |x, y| Ok(Scalar::bool(icmp(*pred, x, y))))
            }
            InstKind::FCmp { pred, lhs, rhs } => {
                let (a, b) = (frame.operand(lhs)?, frame.operand(rhs)?);
                zip_lanes(&a, &b, |x, y| fcmp(*pred, x, y).map(Scalar::bool))
            }
            InstKind::Select { cond, on_true, on_false } => {
                let cond = frame.operand(cond)?;
                let (t, f) = (frame.operand(on_true)?, frame.operand(on_false)?);
                match cond {
                    RtValue::Scalar(c) => Ok(if c.is_true() { t } else { f }),
                    RtValue::Vector(mask) => {
                        let (t, f) = (t.lanes(), f.lanes());
                        if t.len() != mask.len() || f.len() != mask.len() {
                            return Err(EvalError::TypeMismatch("select lane count".into()));
                        }
                        let lanes = mask
                            .iter()
                            .zip(t.iter().zip(&f))
                            .map(|(c, (t, f))| if c.is_true() { *t } else { *f })
                            .collect();
                        Ok(RtValue::Vector(lanes))
                    }
                    RtValue::Void => Err(EvalError::TypeMismatch("select on void".into())),
                }
            }
            InstKind::ShuffleVector { lhs, rhs, mask } => {
                let mut source = frame.operand(lhs)?.lanes();
                source.extend(frame.operand(rhs)?.lanes());
                let undef = Scalar::zero(inst.ty.element())?;
                let lanes = mask
                    .iter()
                    .map(|entry| match entry {
                        None => Ok(undef),
                        Some(i) => source.get(*i as usize).copied().ok_or(EvalError::IndexOutOfRange {
                            index: *i as u64,
                            lanes: source.len(),
                        }),
                    })
                    .collect::<EvalResult<_>>()?;
                Ok(RtValue::Vector(lanes))
            }
            InstKind::ExtractElement { vector, index } => {
                let lanes = frame.operand(vector)?.lanes();
                let index = lane_index(&frame.operand(index)?)?;
                lanes
                    .get(index as usize)
                    .map(|s| RtValue::Scalar(*s))
                    .ok_or(EvalError::IndexOutOfRange { index, lanes: lanes.len() })
            }
            InstKind::InsertElement { vector, element, index } => {
                let mut lanes = frame.operand(vector)?.lanes();
                let element = frame
                    .operand(element)?
                    .as_scalar()
                    .ok_or_else(|| EvalError::TypeMismatch("insertelement of a vector".into()))?;
                let index = lane_index(&frame.operand(index)?)?;
                let count = lanes.len();
                let slot = lanes
                    .get_mut(index as usize)
                    .ok_or(EvalError::IndexOutOfRange { index, lanes: count })?;
                *slot = element;
                Ok(RtValue::Vector(lanes))
            }
            InstKind::Cast { op, value } => {
                let value = frame.operand(value)?;
                cast(*op, &value, &inst.ty)
            }
            InstKind::Call { callee, args } => {
                let args = args.iter().map(|a| frame.operand(a)).collect::<EvalResult<Vec<_>>>()?;
                match callee {
                    Callee::Direct(name) => self.call(name, &args),
                    Callee::Indirect(_) => Err(EvalError::Unsupported("indirect call".into())),
                }
            }
            InstKind::Br { .. } | InstKind::CondBr { .. } | InstKind::Ret { .. } => {
                Err(EvalError::Unsupported("terminator evaluated as a value".into()))
            }
            InstKind::Opaque { opcode, .. } => {
                Err(EvalError::Unsupported(format!("'{}' instruction", opcode)))
            }
        }
    }
}

/// Values computed so far in one activation.
struct Frame<'a> {
    func: &'a Function,
    args: &'a [RtValue],
    values: HashMap<InstId, RtValue>,
}

impl Frame<'_> {
    fn operand(&self, value: &Value) -> EvalResult<RtValue> {
        match value {
            Value::Inst(id) => self.values.get(id).cloned().ok_or(EvalError::Unevaluated(*id)),
            Value::Arg(i) => self.args.get(*i as usize).cloned().ok_or(EvalError::ArgOutOfRange(*i)),
            Value::Const(c) => RtValue::from_constant(c),
            Value::Global(name) => Err(EvalError::Unsupported(format!("address of @{}", name))),
        }
    }
}

impl std::fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("function", &self.func.name)
            .field("values", &self.values.len())
            .finish()
    }
}

fn lane_index(value: &RtValue) -> EvalResult<u64> {
    match value.as_scalar() {
        Some(Scalar::Int { value, .. }) => Ok(value),
        _ => Err(EvalError::TypeMismatch("lane index must be an integer".into())),
    }
}

/// Apply `f` lane by lane (or once for scalars).
fn zip_lanes(
    a: &RtValue,
    b: &RtValue,
    f: impl Fn(Scalar, Scalar) -> EvalResult<Scalar>,
) -> EvalResult<RtValue> {
    match (a, b) {
        (RtValue::Scalar(x), RtValue::Scalar(y)) => f(*x, *y).map(RtValue::Scalar),
        (RtValue::Vector(xs), RtValue::Vector(ys)) if xs.len() == ys.len() => {
            let lanes = xs
                .iter()
                .zip(ys)
                .map(|(x, y)| f(*x, *y))
                .collect::<EvalResult<_>>()?;
            Ok(RtValue::Vector(lanes))
        }
        _ => Err(EvalError::TypeMismatch(format!("operands {:?} and {:?}", a, b))),
    }
}

fn binary(op: BinOp, x: Scalar, y: Scalar) -> EvalResult<Scalar> {
    match (x, y) {
        (Scalar::Int { bits, value: a }, Scalar::Int { bits: rbits, value: b }) if bits == rbits => {
            let oversized = b >= bits as u64;
            let value = match op {
                BinOp::Add => a.wrapping_add(b),
                BinOp::Sub => a.wrapping_sub(b),
                BinOp::Mul => a.wrapping_mul(b),
                BinOp::And => a & b,
                BinOp::Or => a | b,
                BinOp::Xor => a ^ b,
                BinOp::Shl if oversized => 0,
                BinOp::Shl => a << b,
                BinOp::LShr if oversized => 0,
                BinOp::LShr => a >> b,
                BinOp::AShr => {
                    let amount = b.min(bits as u64 - 1);
                    (sign_extend(bits, a) >> amount) as u64
                }
                _ => return Err(EvalError::TypeMismatch(format!("{} on integers", op.mnemonic()))),
            };
            Ok(Scalar::int(bits, value))
        }
        (Scalar::Double(_), Scalar::Double(_)) | (Scalar::Float(_), Scalar::Float(_)) => {
            let (a, b) = (x.as_f64().unwrap_or_default(), y.as_f64().unwrap_or_default());
            let value = match op {
                BinOp::FAdd => a + b,
                BinOp::FSub => a - b,
                BinOp::FMul => a * b,
                BinOp::FDiv => a / b,
                _ => return Err(EvalError::TypeMismatch(format!("{} on floats", op.mnemonic()))),
            };
            Ok(match x {
                // Single-precision results are rounded once from the exact double.
                Scalar::Float(_) => Scalar::float(value as f32),
                _ => Scalar::double(value),
            })
        }
        _ => Err(EvalError::TypeMismatch(format!("{} on {:?} and {:?}", op.mnemonic(), x, y))),
    }
}

fn icmp(pred: IntPredicate, x: Scalar, y: Scalar) -> bool {
    let (a, b) = (x.raw(), y.raw());
    let (sa, sb) = (x.signed(), y.signed());
    match pred {
        IntPredicate::Eq => a == b,
        IntPredicate::Ne => a != b,
        IntPredicate::Ugt => a > b,
        IntPredicate::Uge => a >= b,
        IntPredicate::Ult => a < b,
        IntPredicate::Ule => a <= b,
        IntPredicate::Sgt => sa > sb,
        IntPredicate::Sge => sa >= sb,
        IntPredicate::Slt => sa < sb,
        IntPredicate::Sle => sa <= sb,
    }
}

fn fcmp(pred: FloatPredicate, x: Scalar, y: Scalar) -> EvalResult<bool> {
    let (Some(a), Some(b)) = (x.as_f64(), y.as_f64()) else {
        return Err(EvalError::TypeMismatch("fcmp on integers".into()));
    };
    let unordered = a.is_nan() || b.is_nan();
    Ok(match pred {
        FloatPredicate::False => false,
        FloatPredicate::True => true,
        FloatPredicate::Ord => !unordered,
        FloatPredicate::Uno => unordered,
        FloatPredicate::Oeq => !unordered && a == b,
        FloatPredicate::Ogt => !unordered && a > b,
        FloatPredicate::Oge => !unordered && a >= b,
        FloatPredicate::Olt => !unordered && a < b,
        FloatPredicate::Ole => !unordered && a <= b,
        FloatPredicate::One => !unordered && a != b,
        FloatPredicate::Ueq => unordered || a == b,
        FloatPredicate::Ugt => unordered || a > b,
        FloatPredicate::Uge => unordered || a >= b,
        FloatPredicate::Ult => unordered || a < b,
        FloatPredicate::Ule => unordered || a <= b,
        FloatPredicate::Une => unordered || a != b,
    })
}

fn cast(op: CastOp, value: &RtValue, ty: &Type) -> EvalResult<RtValue> {
    if op == CastOp::BitCast {
        return value.reinterpret(ty);
    }
    let to = ty.scalar_bits();
    let convert = |s: &Scalar| match s {
        Scalar::Int { bits, value } => Ok(match op {
            CastOp::SExt => Scalar::int(to, mask_to(to, sign_extend(*bits, *value) as u64)),
            _ => Scalar::int(to, *value),
        }),
        other => Err(EvalError::TypeMismatch(format!("{} of {:?}", op.mnemonic(), other))),
    };
    match value {
        RtValue::Scalar(s) => convert(s).map(RtValue::Scalar),
        RtValue::Vector(lanes) => Ok(RtValue::Vector(lanes.iter().map(convert).collect::<EvalResult<_>>()?)),
        RtValue::Void => Err(EvalError::TypeMismatch("cast of void".into())),
    }
}

/// Calls to functions the module does not define.
fn call_external(name: &str, args: &[RtValue]) -> EvalResult<RtValue> {
    if let Some(kind) = IntrinsicKind::from_name(name) {
        return semantics::evaluate(kind, args);
    }
    if name.starts_with("llvm.fma.") {
        let [a, b, c] = <&[RtValue; 3]>::try_from(args).map_err(|_| EvalError::ArgCount {
            function: name.to_string(),
            expected: 3,
            found: args.len(),
        })?;
        let (xs, ys, zs) = (a.lanes(), b.lanes(), c.lanes());
        if xs.len() != ys.len() || xs.len() != zs.len() {
            return Err(EvalError::TypeMismatch("fma lane count".into()));
        }
        let lanes = (0..xs.len())
            .map(|i| fma(xs[i], ys[i], zs[i]))
            .collect::<EvalResult<_>>()?;
        return Ok(repack(a, lanes));
    }
    if name.starts_with("llvm.sqrt.") {
        let [a] = <&[RtValue; 1]>::try_from(args).map_err(|_| EvalError::ArgCount {
            function: name.to_string(),
            expected: 1,
            found: args.len(),
        })?;
        let lanes = a.lanes().iter().map(|x| sqrt(*x)).collect::<EvalResult<_>>()?;
        return Ok(repack(a, lanes));
    }
    Err(EvalError::UnknownFunction(name.to_string()))
}

/// Same shape as `like` (scalar or vector) with new lanes.
fn repack(like: &RtValue, mut lanes: Vec<Scalar>) -> RtValue {
    match like {
        RtValue::Scalar(_) if lanes.len() == 1 => RtValue::Scalar(lanes.remove(0)),
        _ => RtValue::Vector(lanes),
    }
}

fn fma(x: Scalar, y: Scalar, z: Scalar) -> EvalResult<Scalar> {
    match (x, y, z) {
        (Scalar::Double(a), Scalar::Double(b), Scalar::Double(c)) => Ok(Scalar::double(
            f64::from_bits(a).mul_add(f64::from_bits(b), f64::from_bits(c)),
        )),
        (Scalar::Float(a), Scalar::Float(b), Scalar::Float(c)) => Ok(Scalar::float(
            f32::from_bits(a).mul_add(f32::from_bits(b), f32::from_bits(c)),
        )),
        _ => Err(EvalError::TypeMismatch("fma operands".into())),
    }
}

fn sqrt(x: Scalar) -> EvalResult<Scalar> {
    match x {
        Scalar::Double(a) => Ok(Scalar::double(f64::from_bits(a).sqrt())),
        Scalar::Float(a) => Ok(Scalar::float(f32::from_bits(a).sqrt())),
        _ => Err(EvalError::TypeMismatch("sqrt operand".into())),
    }
}

/// Run `name` in `module` with the default fuel.
pub fn run(module: &Module, name: &str, args: &[RtValue]) -> EvalResult<RtValue> {
    Interpreter::new(module).call(name, args)
}
