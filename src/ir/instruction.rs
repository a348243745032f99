//! Instruction representation
//!
//! Instructions live in a per-function arena and are referenced by
//! [`InstId`]. Blocks only hold ordered lists of ids, so erasing an
//! instruction from a block never invalidates the ids of its neighbours.
//!
//! [`InstKind`] is generic over its operand type so the parser can build
//! instructions with unresolved names before lowering them to [`Value`]s.

use super::{Type, Value};
use std::fmt;

/// Index of an instruction in its function's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Two-operand arithmetic and bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinOp {
    pub const ALL: [BinOp; 13] = [
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::And,
        BinOp::Or,
        BinOp::Xor,
        BinOp::Shl,
        BinOp::LShr,
        BinOp::AShr,
        BinOp::FAdd,
        BinOp::FSub,
        BinOp::FMul,
        BinOp::FDiv,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::LShr => "lshr",
            BinOp::AShr => "ashr",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IntPredicate {
    pub const ALL: [IntPredicate; 10] = [
        IntPredicate::Eq,
        IntPredicate::Ne,
        IntPredicate::Ugt,
        IntPredicate::Uge,
        IntPredicate::Ult,
        IntPredicate::Ule,
        IntPredicate::Sgt,
        IntPredicate::Sge,
        IntPredicate::Slt,
        IntPredicate::Sle,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.mnemonic() == s)
    }
}

/// Floating-point comparison predicates (ordered `o*`, unordered `u*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
    True,
}

impl FloatPredicate {
    pub const ALL: [FloatPredicate; 16] = [
        FloatPredicate::False,
        FloatPredicate::Oeq,
        FloatPredicate::Ogt,
        FloatPredicate::Oge,
        FloatPredicate::Olt,
        FloatPredicate::Ole,
        FloatPredicate::One,
        FloatPredicate::Ord,
        FloatPredicate::Ueq,
        FloatPredicate::Ugt,
        FloatPredicate::Uge,
        FloatPredicate::Ult,
        FloatPredicate::Ule,
        FloatPredicate::Une,
        FloatPredicate::Uno,
        FloatPredicate::True,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatPredicate::False => "false",
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::One => "one",
            FloatPredicate::Ord => "ord",
            FloatPredicate::Ueq => "ueq",
            FloatPredicate::Ugt => "ugt",
            FloatPredicate::Uge => "uge",
            FloatPredicate::Ult => "ult",
            FloatPredicate::Ule => "ule",
            FloatPredicate::Une => "une",
            FloatPredicate::Uno => "uno",
            FloatPredicate::True => "true",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.mnemonic() == s)
    }
}

/// Conversion operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    BitCast,
}

impl CastOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::BitCast => "bitcast",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        [CastOp::Trunc, CastOp::ZExt, CastOp::SExt, CastOp::BitCast]
            .into_iter()
            .find(|op| op.mnemonic() == s)
    }
}

/// Call target.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee<V = Value> {
    /// Direct call to a named function or intrinsic
    Direct(String),
    /// Call through a pointer value
    Indirect(V),
}

/// Opcodes of kept-as-written instructions that end a block.
const OPAQUE_TERMINATORS: &[&str] =
    &["switch", "indirectbr", "invoke", "callbr", "resume", "unreachable"];

/// One piece of an instruction kept as written.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment<V = Value> {
    /// Source text, printed verbatim
    Text(String),
    /// A value reference; uses are redirected like any other operand
    Operand(V),
    /// A block label reference
    Label(String),
}

/// Instruction payload.
#[derive(Debug, Clone, PartialEq)]
pub enum InstKind<V = Value> {
    Binary { op: BinOp, lhs: V, rhs: V },
    ICmp { pred: IntPredicate, lhs: V, rhs: V },
    FCmp { pred: FloatPredicate, lhs: V, rhs: V },
    Select { cond: V, on_true: V, on_false: V },
    /// Lanes are taken from `lhs ++ rhs`; `None` is an undefined lane.
    ShuffleVector { lhs: V, rhs: V, mask: Vec<Option<u32>> },
    ExtractElement { vector: V, index: V },
    InsertElement { vector: V, element: V, index: V },
    /// Target type is the instruction's result type.
    Cast { op: CastOp, value: V },
    Call { callee: Callee<V>, args: Vec<V> },
    Br { target: String },
    CondBr { cond: V, then_dest: String, else_dest: String },
    Ret { value: Option<V> },
    /// An instruction outside the modelled set (`load`, `store`, `phi`,
    /// `alloca`, `getelementptr`, ...). Only its value and label references
    /// are understood.
    Opaque { opcode: String, fragments: Vec<Fragment<V>> },
}

impl<V> InstKind<V> {
    /// Operands in textual order.
    pub fn operands(&self) -> Vec<&V> {
        match self {
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. }
            | InstKind::FCmp { lhs, rhs, .. }
            | InstKind::ShuffleVector { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Select { cond, on_true, on_false } => vec![cond, on_true, on_false],
            InstKind::ExtractElement { vector, index } => vec![vector, index],
            InstKind::InsertElement { vector, element, index } => vec![vector, element, index],
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Call { callee, args } => {
                let mut ops = Vec::with_capacity(args.len() + 1);
                if let Callee::Indirect(target) = callee {
                    ops.push(target);
                }
                ops.extend(args.iter());
                ops
            }
            InstKind::Br { .. } => Vec::new(),
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Ret { value } => value.iter().collect(),
            InstKind::Opaque { fragments, .. } => fragments
                .iter()
                .filter_map(|fragment| match fragment {
                    Fragment::Operand(v) => Some(v),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Mutable operands, same order as [`InstKind::operands`].
    pub fn operands_mut(&mut self) -> Vec<&mut V> {
        match self {
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. }
            | InstKind::FCmp { lhs, rhs, .. }
            | InstKind::ShuffleVector { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Select { cond, on_true, on_false } => vec![cond, on_true, on_false],
            InstKind::ExtractElement { vector, index } => vec![vector, index],
            InstKind::InsertElement { vector, element, index } => vec![vector, element, index],
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Call { callee, args } => {
                let mut ops = Vec::with_capacity(args.len() + 1);
                if let Callee::Indirect(target) = callee {
                    ops.push(target);
                }
                ops.extend(args.iter_mut());
                ops
            }
            InstKind::Br { .. } => Vec::new(),
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Ret { value } => value.iter_mut().collect(),
            InstKind::Opaque { fragments, .. } => fragments
                .iter_mut()
                .filter_map(|fragment| match fragment {
                    Fragment::Operand(v) => Some(v),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Convert every operand, failing on the first error.
    pub fn try_map<W, E>(self, mut f: impl FnMut(V) -> Result<W, E>) -> Result<InstKind<W>, E> {
        Ok(match self {
            InstKind::Binary { op, lhs, rhs } => InstKind::Binary { op, lhs: f(lhs)?, rhs: f(rhs)? },
            InstKind::ICmp { pred, lhs, rhs } => InstKind::ICmp { pred, lhs: f(lhs)?, rhs: f(rhs)? },
            InstKind::FCmp { pred, lhs, rhs } => InstKind::FCmp { pred, lhs: f(lhs)?, rhs: f(rhs)? },
            InstKind::Select { cond, on_true, on_false } => InstKind::Select {
                cond: f(cond)?,
                on_true: f(on_true)?,
                on_false: f(on_false)?,
            },
            InstKind::ShuffleVector { lhs, rhs, mask } => {
                InstKind::ShuffleVector { lhs: f(lhs)?, rhs: f(rhs)?, mask }
            }
            InstKind::ExtractElement { vector, index } => {
                InstKind::ExtractElement { vector: f(vector)?, index: f(index)? }
            }
            InstKind::InsertElement { vector, element, index } => InstKind::InsertElement {
                vector: f(vector)?,
                element: f(element)?,
                index: f(index)?,
            },
            InstKind::Cast { op, value } => InstKind::Cast { op, value: f(value)? },
            InstKind::Call { callee, args } => {
                let callee = match callee {
                    Callee::Direct(name) => Callee::Direct(name),
                    Callee::Indirect(target) => Callee::Indirect(f(target)?),
                };
                let args = args.into_iter().map(&mut f).collect::<Result<Vec<_>, E>>()?;
                InstKind::Call { callee, args }
            }
            InstKind::Br { target } => InstKind::Br { target },
            InstKind::CondBr { cond, then_dest, else_dest } => {
                InstKind::CondBr { cond: f(cond)?, then_dest, else_dest }
            }
            InstKind::Ret { value } => InstKind::Ret { value: value.map(f).transpose()? },
            InstKind::Opaque { opcode, fragments } => {
                let fragments = fragments
                    .into_iter()
                    .map(|fragment| {
                        Ok(match fragment {
                            Fragment::Text(text) => Fragment::Text(text),
                            Fragment::Operand(v) => Fragment::Operand(f(v)?),
                            Fragment::Label(label) => Fragment::Label(label),
                        })
                    })
                    .collect::<Result<Vec<_>, E>>()?;
                InstKind::Opaque { opcode, fragments }
            }
        })
    }

    /// Is this a block terminator?
    pub fn is_terminator(&self) -> bool {
        match self {
            InstKind::Br { .. } | InstKind::CondBr { .. } | InstKind::Ret { .. } => true,
            InstKind::Opaque { opcode, .. } => OPAQUE_TERMINATORS.contains(&opcode.as_str()),
            _ => false,
        }
    }

    /// Successor labels of a terminator.
    pub fn successors(&self) -> Vec<&str> {
        match self {
            InstKind::Br { target } => vec![target.as_str()],
            InstKind::CondBr { then_dest, else_dest, .. } => {
                vec![then_dest.as_str(), else_dest.as_str()]
            }
            InstKind::Opaque { fragments, .. } if self.is_terminator() => fragments
                .iter()
                .filter_map(|fragment| match fragment {
                    Fragment::Label(label) => Some(label.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Name of the directly called function, if this is a direct call.
    pub fn called_name(&self) -> Option<&str> {
        match self {
            InstKind::Call { callee: Callee::Direct(name), .. } => Some(name),
            _ => None,
        }
    }

    /// Opcode mnemonic as printed.
    pub fn mnemonic(&self) -> &str {
        match self {
            InstKind::Binary { op, .. } => op.mnemonic(),
            InstKind::ICmp { .. } => "icmp",
            InstKind::FCmp { .. } => "fcmp",
            InstKind::Select { .. } => "select",
            InstKind::ShuffleVector { .. } => "shufflevector",
            InstKind::ExtractElement { .. } => "extractelement",
            InstKind::InsertElement { .. } => "insertelement",
            InstKind::Cast { op, .. } => op.mnemonic(),
            InstKind::Call { .. } => "call",
            InstKind::Br { .. } | InstKind::CondBr { .. } => "br",
            InstKind::Ret { .. } => "ret",
            InstKind::Opaque { opcode, .. } => opcode.as_str(),
        }
    }
}

/// An instruction: optional result name, result type, and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Result name (without `%`), `None` for void instructions
    pub name: Option<String>,
    /// Result type (`void` for instructions without a result)
    pub ty: Type,
    pub kind: InstKind,
}

impl Instruction {
    pub fn new(name: Option<String>, ty: Type, kind: InstKind) -> Self {
        Self { name, ty, kind }
    }

    /// Create `ret <value>` / `ret void`.
    pub fn ret(value: Option<Value>) -> Self {
        Self::new(None, Type::Void, InstKind::Ret { value })
    }

    /// Create `br label %target`.
    pub fn br(target: impl Into<String>) -> Self {
        Self::new(None, Type::Void, InstKind::Br { target: target.into() })
    }

    pub fn is_terminator(&self) -> bool {
        self.kind.is_terminator()
    }

    pub fn called_name(&self) -> Option<&str> {
        self.kind.called_name()
    }

    /// Does this instruction produce a value?
    pub fn has_result(&self) -> bool {
        !self.ty.is_void()
    }

    /// Ids of instructions used as operands.
    pub fn inst_operands(&self) -> Vec<InstId> {
        self.kind
            .operands()
            .into_iter()
            .filter_map(Value::as_inst)
            .collect()
    }
}
