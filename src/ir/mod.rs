//! SSA vector IR
//!
//! A small LLVM-shaped representation: typed values, fixed-width vector
//! types, instructions held in a per-function arena, and ordered basic
//! blocks.
//!
//! # Structure
//!
//! ```text
//! Module
//! ├── Named types and globals (kept as written)
//! ├── Declarations (external functions and intrinsics)
//! └── Functions
//!     └── BasicBlocks
//!         └── Instructions
//! ```

pub mod block;
pub mod builder;
pub mod constant;
pub mod function;
pub mod instruction;
pub mod module;
pub mod printer;
pub mod types;
pub mod verify;

pub use block::BasicBlock;
pub use builder::Builder;
pub use constant::Constant;
pub use function::{Function, Param};
pub use instruction::{
    BinOp, CastOp, Callee, FloatPredicate, Fragment, InstId, InstKind, Instruction, IntPredicate,
};
pub use module::{Declarations, Module, Signature};
pub use types::Type;

/// An operand: instruction result, function argument, global symbol or constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Result of an instruction in the same function
    Inst(InstId),

    /// Function argument by position
    Arg(u32),

    /// Address of a global variable or function (`@name`)
    Global(String),

    /// Constant
    Const(Constant),
}

impl Value {
    pub fn const_int(bits: u32, value: u64) -> Self {
        Value::Const(Constant::int(bits, value))
    }

    pub fn undef(ty: Type) -> Self {
        Value::Const(Constant::Undef(ty))
    }

    pub fn as_inst(&self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_const(&self) -> Option<&Constant> {
        match self {
            Value::Const(c) => Some(c),
            _ => None,
        }
    }
}

impl From<Constant> for Value {
    fn from(c: Constant) -> Self {
        Value::Const(c)
    }
}
