//! Textual IR printer
//!
//! Output uses the same syntax the parser accepts, so printed modules
//! re-parse to an identical structure. Floating-point constants print as
//! 64-bit hex to keep their exact bit pattern.

use super::{Callee, Fragment, Function, InstId, InstKind, Instruction, Module, Type, Value};
use std::fmt::{self, Write};

/// Text of a value reference without its type.
pub fn value_text(func: &Function, value: &Value) -> String {
    match value {
        Value::Const(c) => c.to_string(),
        Value::Inst(id) => match func.inst(*id) {
            Some(inst) => match &inst.name {
                Some(name) => format!("%{}", name),
                None => format!("%.{}", id.0),
            },
            None => format!("%<dangling {}>", id),
        },
        Value::Arg(index) => match func.params.get(*index as usize) {
            Some(param) => format!("%{}", param.name),
            None => format!("%<arg {}>", index),
        },
        Value::Global(name) => format!("@{}", name),
    }
}

/// Join source pieces with single spaces, keeping brackets and commas tight
/// (`[2 x i32]`, `@f(i32 1)`, `c"..."`).
pub fn join_pieces<S: AsRef<str>>(pieces: &[S]) -> String {
    let mut out = String::new();
    let mut prev: Option<&str> = None;
    for piece in pieces {
        let piece = piece.as_ref();
        let tight = match prev {
            None => true,
            Some(prev) => {
                matches!(piece, "," | ")" | "]" | ">")
                    || matches!(prev, "(" | "[" | "<")
                    || (piece == "(" && prev.starts_with('@'))
                    || (prev == "c" && piece.starts_with('"'))
            }
        };
        if !tight {
            out.push(' ');
        }
        out.push_str(piece);
        prev = Some(piece);
    }
    out
}

fn value_type(func: &Function, value: &Value) -> Type {
    func.value_type(value).unwrap_or(Type::Void)
}

/// `<type> <value>`
pub fn typed_text(func: &Function, value: &Value) -> String {
    format!("{} {}", value_type(func, value), value_text(func, value))
}

/// Print one instruction (without indentation).
pub fn inst_text(func: &Function, inst: &Instruction) -> String {
    let mut out = String::new();
    // An unnamed result cannot be referenced; print the bare instruction.
    if let (true, Some(name)) = (inst.has_result(), &inst.name) {
        out.push_str(&format!("%{} = ", name));
    }
    let v = |value: &Value| value_text(func, value);
    let tv = |value: &Value| typed_text(func, value);

    let body = match &inst.kind {
        InstKind::Binary { op, lhs, rhs } => {
            format!("{} {}, {}", op.mnemonic(), tv(lhs), v(rhs))
        }
        InstKind::ICmp { pred, lhs, rhs } => {
            format!("icmp {} {}, {}", pred.mnemonic(), tv(lhs), v(rhs))
        }
        InstKind::FCmp { pred, lhs, rhs } => {
            format!("fcmp {} {}, {}", pred.mnemonic(), tv(lhs), v(rhs))
        }
        InstKind::Select { cond, on_true, on_false } => {
            format!("select {}, {}, {}", tv(cond), tv(on_true), tv(on_false))
        }
        InstKind::ShuffleVector { lhs, rhs, mask } => {
            let lanes: Vec<String> = mask
                .iter()
                .map(|m| match m {
                    Some(i) => format!("i32 {}", i),
                    None => "i32 undef".to_string(),
                })
                .collect();
            format!(
                "shufflevector {}, {}, <{} x i32> <{}>",
                tv(lhs),
                tv(rhs),
                mask.len(),
                lanes.join(", ")
            )
        }
        InstKind::ExtractElement { vector, index } => {
            format!("extractelement {}, {}", tv(vector), tv(index))
        }
        InstKind::InsertElement { vector, element, index } => {
            format!("insertelement {}, {}, {}", tv(vector), tv(element), tv(index))
        }
        InstKind::Cast { op, value } => {
            format!("{} {} to {}", op.mnemonic(), tv(value), inst.ty)
        }
        InstKind::Call { callee, args } => {
            let target = match callee {
                Callee::Direct(name) => format!("@{}", name),
                Callee::Indirect(ptr) => v(ptr),
            };
            let args: Vec<String> = args.iter().map(tv).collect();
            format!("call {} {}({})", inst.ty, target, args.join(", "))
        }
        InstKind::Br { target } => format!("br label %{}", target),
        InstKind::CondBr { cond, then_dest, else_dest } => {
            format!("br {}, label %{}, label %{}", tv(cond), then_dest, else_dest)
        }
        InstKind::Ret { value: Some(value) } => format!("ret {}", tv(value)),
        InstKind::Ret { value: None } => "ret void".to_string(),
        InstKind::Opaque { opcode, fragments } => {
            let mut pieces = vec![opcode.clone()];
            pieces.extend(fragments.iter().map(|fragment| match fragment {
                Fragment::Text(text) => text.clone(),
                Fragment::Operand(value) => v(value),
                Fragment::Label(label) => format!("%{}", label),
            }));
            join_pieces(&pieces)
        }
    };
    out.push_str(&body);
    out
}

/// Print an instruction by id; erased ids print a placeholder.
pub fn inst_id_text(func: &Function, id: InstId) -> String {
    match func.inst(id) {
        Some(inst) => inst_text(func, inst),
        None => format!("<erased {}>", id),
    }
}

/// Print one block: label line then indented instructions.
pub fn block_text(func: &Function, label: &str) -> String {
    let mut out = String::new();
    if let Some(block) = func.block(label) {
        let _ = writeln!(out, "{}:", block.label());
        for id in block.iter() {
            let _ = writeln!(out, "  {}", inst_id_text(func, id));
        }
    }
    out
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "define {} @{}(", self.ret_ty, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} %{}", param.ty, param.name)?;
        }
        writeln!(f, ") {{")?;
        for (i, block) in self.blocks().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", block_text(self, block.label()))?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name.is_empty() {
            writeln!(f, "; ModuleID = '{}'", self.name)?;
        }
        for (name, body) in &self.type_defs {
            writeln!(f, "%{} = {}", name, body)?;
        }
        for (name, body) in &self.globals {
            writeln!(f, "@{} = {}", name, body)?;
        }
        for (name, sig) in &self.declarations {
            let params: Vec<String> = sig.params.iter().map(Type::to_string).collect();
            writeln!(f, "declare {} @{}({})", sig.ret, name, params.join(", "))?;
        }
        for func in self.functions.values() {
            writeln!(f)?;
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}
