//! Module representation

use super::{Function, Type, Value};
use indexmap::{IndexMap, IndexSet};
use std::fmt;

/// Signature of an external function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub ret: Type,
    pub params: Vec<Type>,
}

impl Signature {
    pub fn new(ret: Type, params: Vec<Type>) -> Self {
        Self { ret, params }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.ret)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}

/// External declarations by name, in declaration order.
pub type Declarations = IndexMap<String, Signature>;

/// Global variables by name; the text after `=` as written.
pub type Globals = IndexMap<String, String>;

/// A translation unit: defined functions plus external declarations.
///
/// Fields are public so a pass can borrow one function mutably alongside
/// the declaration table.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Module name (usually the source file name)
    pub name: String,
    /// Defined functions by name
    pub functions: IndexMap<String, Function>,
    /// Declared (external) functions and intrinsics
    pub declarations: Declarations,
    /// Global variables
    pub globals: Globals,
    /// Named struct types (`%name = type ...`), the text after `=` as written
    pub type_defs: IndexMap<String, String>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a function definition, replacing any previous one with the same name.
    pub fn add_function(&mut self, func: Function) {
        self.functions.insert(func.name.clone(), func);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Declare an external function. The first declaration of a name wins.
    pub fn declare(&mut self, name: impl Into<String>, sig: Signature) {
        self.declarations.entry(name.into()).or_insert(sig);
    }

    /// Is `name` a declared or defined function or a global variable?
    pub fn has_symbol(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
            || self.functions.contains_key(name)
            || self.globals.contains_key(name)
    }

    /// Names of all directly called functions and `@name` operands, in
    /// first-use order.
    pub fn referenced_names(&self) -> IndexSet<String> {
        let mut names = IndexSet::new();
        for func in self.functions.values() {
            for (_, inst) in func.insts() {
                if let Some(name) = inst.called_name() {
                    names.insert(name.to_string());
                }
                for operand in inst.kind.operands() {
                    if let Value::Global(name) = operand {
                        names.insert(name.clone());
                    }
                }
            }
        }
        names
    }

    /// Total number of placed instructions across all functions.
    pub fn num_insts(&self) -> usize {
        self.functions.values().map(Function::num_insts).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Callee, Fragment, InstKind, Instruction};

    #[test]
    fn test_declare_keeps_first() {
        let mut module = Module::new("m");
        module.declare("f", Signature::new(Type::i32(), vec![]));
        module.declare("f", Signature::new(Type::Void, vec![Type::i8()]));
        assert_eq!(module.declarations["f"].ret, Type::i32());
        assert_eq!(module.declarations["f"].to_string(), "i32 ()");
    }

    #[test]
    fn test_referenced_names() {
        let mut func = Function::new("main", Type::Void);
        func.append(
            "entry",
            Instruction::new(
                None,
                Type::Void,
                InstKind::Call { callee: Callee::Direct("g".into()), args: vec![] },
            ),
        );
        func.append(
            "entry",
            Instruction::new(
                None,
                Type::Void,
                InstKind::Call { callee: Callee::Indirect(Value::Arg(0)), args: vec![] },
            ),
        );
        func.append(
            "entry",
            Instruction::new(
                None,
                Type::Void,
                InstKind::Opaque {
                    opcode: "store".into(),
                    fragments: vec![
                        Fragment::Text("ptr".into()),
                        Fragment::Operand(Value::Global("handler".into())),
                        Fragment::Text(",".into()),
                        Fragment::Text("ptr".into()),
                        Fragment::Operand(Value::Global("slot".into())),
                    ],
                },
            ),
        );
        func.append("entry", Instruction::ret(None));

        let mut module = Module::new("m");
        module.add_function(func);
        module.globals.insert("slot".into(), "global ptr null".into());
        let names: Vec<_> = module.referenced_names().into_iter().collect();
        assert_eq!(names, vec!["g".to_string(), "handler".to_string(), "slot".to_string()]);
        assert!(module.has_symbol("main"));
        assert!(module.has_symbol("slot"));
        assert!(!module.has_symbol("g"));
    }
}
