//! Structural verifier
//!
//! Checks the invariants the rewriter relies on and must preserve. Every
//! problem is collected; the verifier never stops at the first one.

use super::{Function, InstId, InstKind, Module, Type, Value};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerifyError {
    #[error("@{function}: block '{block}' is empty")]
    EmptyBlock { function: String, block: String },

    #[error("@{function}: block '{block}' does not end in a terminator")]
    MissingTerminator { function: String, block: String },

    #[error("@{function}: block '{block}' has a terminator at index {index} before its end")]
    TerminatorNotLast { function: String, block: String, index: usize },

    #[error("@{function}: block '{block}' index {index}: operand {operand} is not a live instruction")]
    DanglingOperand {
        function: String,
        block: String,
        index: usize,
        operand: InstId,
    },

    #[error("@{function}: block '{block}' index {index}: argument {arg} out of range")]
    ArgOutOfRange {
        function: String,
        block: String,
        index: usize,
        arg: u32,
    },

    #[error("@{function}: block '{block}' index {index}: operand types differ ({lhs} vs {rhs})")]
    TypeMismatch {
        function: String,
        block: String,
        index: usize,
        lhs: Type,
        rhs: Type,
    },

    #[error("@{function}: block '{block}' index {index}: call to undeclared function @{callee}")]
    UndeclaredCallee {
        function: String,
        block: String,
        index: usize,
        callee: String,
    },

    #[error("@{function}: block '{block}' index {index}: reference to unknown global @{name}")]
    UndefinedGlobal {
        function: String,
        block: String,
        index: usize,
        name: String,
    },

    #[error("@{function}: block '{block}' branches to unknown block '{target}'")]
    UnknownTarget {
        function: String,
        block: String,
        target: String,
    },
}

/// Verify every function of a module.
pub fn verify_module(module: &Module) -> Vec<VerifyError> {
    module
        .functions
        .values()
        .flat_map(|func| verify_function(module, func))
        .collect()
}

/// Verify one function in the context of its module.
pub fn verify_function(module: &Module, func: &Function) -> Vec<VerifyError> {
    let mut errors = Vec::new();
    let placed: HashSet<InstId> = func.blocks().flat_map(|b| b.iter()).collect();
    let function = || func.name.clone();

    for block in func.blocks() {
        let label = block.label();
        let Some(last) = block.last() else {
            errors.push(VerifyError::EmptyBlock { function: function(), block: label.to_string() });
            continue;
        };
        if !func.inst(last).map_or(false, |inst| inst.is_terminator()) {
            errors.push(VerifyError::MissingTerminator {
                function: function(),
                block: label.to_string(),
            });
        }

        for (index, id) in block.iter().enumerate() {
            let Some(inst) = func.inst(id) else {
                errors.push(VerifyError::DanglingOperand {
                    function: function(),
                    block: label.to_string(),
                    index,
                    operand: id,
                });
                continue;
            };

            if inst.is_terminator() && index + 1 != block.len() {
                errors.push(VerifyError::TerminatorNotLast {
                    function: function(),
                    block: label.to_string(),
                    index,
                });
            }

            for operand in inst.kind.operands() {
                match operand {
                    Value::Inst(op) if !placed.contains(op) || func.inst(*op).is_none() => {
                        errors.push(VerifyError::DanglingOperand {
                            function: function(),
                            block: label.to_string(),
                            index,
                            operand: *op,
                        });
                    }
                    Value::Arg(arg) if *arg as usize >= func.params.len() => {
                        errors.push(VerifyError::ArgOutOfRange {
                            function: function(),
                            block: label.to_string(),
                            index,
                            arg: *arg,
                        });
                    }
                    Value::Global(name) if !module.has_symbol(name) => {
                        errors.push(VerifyError::UndefinedGlobal {
                            function: function(),
                            block: label.to_string(),
                            index,
                            name: name.clone(),
                        });
                    }
                    _ => {}
                }
            }

            match &inst.kind {
                InstKind::Binary { lhs, rhs, .. }
                | InstKind::ICmp { lhs, rhs, .. }
                | InstKind::FCmp { lhs, rhs, .. } => {
                    if let (Some(l), Some(r)) = (func.value_type(lhs), func.value_type(rhs)) {
                        if l != r {
                            errors.push(VerifyError::TypeMismatch {
                                function: function(),
                                block: label.to_string(),
                                index,
                                lhs: l,
                                rhs: r,
                            });
                        }
                    }
                }
                _ => {}
            }

            if let Some(callee) = inst.called_name() {
                if !module.has_symbol(callee) {
                    errors.push(VerifyError::UndeclaredCallee {
                        function: function(),
                        block: label.to_string(),
                        index,
                        callee: callee.to_string(),
                    });
                }
            }

            for target in inst.kind.successors() {
                if func.block(target).is_none() {
                    errors.push(VerifyError::UnknownTarget {
                        function: function(),
                        block: label.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, Callee, Fragment, Instruction};

    fn module_with(func: Function) -> Module {
        let mut module = Module::new("m");
        module.add_function(func);
        module
    }

    #[test]
    fn test_well_formed_function() {
        let mut func = Function::new("f", Type::i32());
        let x = func.add_param("x", Type::i32());
        let a = func.append(
            "entry",
            Instruction::new(
                Some("a".into()),
                Type::i32(),
                InstKind::Binary { op: BinOp::Add, lhs: x, rhs: Value::const_int(32, 1) },
            ),
        );
        func.append("entry", Instruction::ret(Some(Value::Inst(a))));
        assert!(verify_module(&module_with(func)).is_empty());
    }

    #[test]
    fn test_collects_every_problem() {
        let mut func = Function::new("f", Type::Void);
        func.append(
            "entry",
            Instruction::new(
                Some("a".into()),
                Type::i32(),
                InstKind::Binary {
                    op: BinOp::Add,
                    lhs: Value::const_int(32, 1),
                    rhs: Value::const_int(8, 1),
                },
            ),
        );
        func.append(
            "entry",
            Instruction::new(
                None,
                Type::Void,
                InstKind::Call { callee: Callee::Direct("missing".into()), args: vec![Value::Arg(3)] },
            ),
        );

        let errors = verify_module(&module_with(func));
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], VerifyError::MissingTerminator { .. }));
        assert!(matches!(errors[1], VerifyError::TypeMismatch { .. }));
        assert!(matches!(errors[2], VerifyError::ArgOutOfRange { arg: 3, .. }));
        assert!(matches!(errors[3], VerifyError::UndeclaredCallee { .. }));
    }

    #[test]
    fn test_globals_and_opaque_terminators() {
        let mut func = Function::new("f", Type::Void);
        func.append(
            "entry",
            Instruction::new(
                None,
                Type::Void,
                InstKind::Opaque {
                    opcode: "store".into(),
                    fragments: vec![
                        Fragment::Text("i32".into()),
                        Fragment::Text("0".into()),
                        Fragment::Text(",".into()),
                        Fragment::Text("ptr".into()),
                        Fragment::Operand(Value::Global("counter".into())),
                    ],
                },
            ),
        );
        func.append(
            "entry",
            Instruction::new(
                None,
                Type::Void,
                InstKind::Opaque {
                    opcode: "switch".into(),
                    fragments: vec![
                        Fragment::Text("i32".into()),
                        Fragment::Text("0".into()),
                        Fragment::Text(",".into()),
                        Fragment::Text("label".into()),
                        Fragment::Label("gone".into()),
                        Fragment::Text("[".into()),
                        Fragment::Text("]".into()),
                    ],
                },
            ),
        );

        let mut module = module_with(func);
        let errors = verify_module(&module);
        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], VerifyError::UndefinedGlobal { name, .. } if name == "counter"));
        assert!(matches!(&errors[1], VerifyError::UnknownTarget { target, .. } if target == "gone"));

        module.globals.insert("counter".into(), "global i32 0".into());
        assert_eq!(verify_module(&module).len(), 1);
    }

    #[test]
    fn test_dangling_operand_after_erase() {
        let mut func = Function::new("f", Type::i32());
        let a = func.append(
            "entry",
            Instruction::new(
                Some("a".into()),
                Type::i32(),
                InstKind::Binary {
                    op: BinOp::Add,
                    lhs: Value::const_int(32, 1),
                    rhs: Value::const_int(32, 1),
                },
            ),
        );
        func.append("entry", Instruction::ret(Some(Value::Inst(a))));
        func.erase("entry", 0);

        let errors = verify_module(&module_with(func));
        assert_eq!(
            errors,
            vec![VerifyError::DanglingOperand {
                function: "f".into(),
                block: "entry".into(),
                index: 0,
                operand: a,
            }]
        );
    }
}
