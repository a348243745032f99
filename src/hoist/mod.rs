//! Intrinsic hoisting
//!
//! Replaces calls to recognized target intrinsics with equivalent sequences
//! of portable instructions.
//!
//! # Architecture
//!
//! ```text
//! Hoister::run_on_module
//!     ↓ per function
//! Hoister::run_on_function
//!     ↓ per block
//! Hoister::run_on_block (scanner)
//!     ↓ per call
//! IntrinsicKind::from_name (dispatcher)
//!     ↓
//! IntrinsicKind::validate + rule (builder inserts before the call)
//!     ↓
//! splice (redirect uses, erase the call)
//! ```
//!
//! Blocks are processed independently and exactly once. Nothing inserted
//! by a rule is ever rescanned: the scan resumes right after the erased
//! call.

pub mod arith;
pub mod catalog;
pub mod compare;
pub mod math;
pub mod observer;
pub mod pack;
pub mod reduce;
pub mod shift;

pub use catalog::{IntrinsicKind, OperandClass, Rule, TARGET_PREFIX};
pub use observer::{HoistObserver, LogObserver, NoopObserver, SkipReason};

use crate::config::{HoistConfig, MalformedPolicy};
use crate::ir::printer::inst_id_text;
use crate::ir::{Builder, Declarations, Function, InstId, Module, Type, Value};
use thiserror::Error;

/// A recognized call whose operands do not fit its rule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("expected {expected} operands, found {found}")]
    OperandCount { expected: usize, found: usize },

    #[error("operand {index}: expected {expected}, found {found}")]
    OperandType {
        index: usize,
        expected: String,
        found: Type,
    },

    #[error("operand {index}: predicate must be an integer constant")]
    NonConstantPredicate { index: usize },

    #[error("result type must be {expected}, found {found}")]
    ResultType { expected: Type, found: Type },
}

/// Where an instruction sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstLocation {
    pub function: String,
    pub block: String,
    pub index: usize,
}

impl std::fmt::Display for InstLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}, block '{}', instruction {}", self.function, self.block, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HoistError {
    #[error("malformed call to {} at {location}: {source}\n  {inst}", .kind.name())]
    Malformed {
        kind: IntrinsicKind,
        location: InstLocation,
        inst: String,
        source: RuleError,
    },

    #[error("@{function}: no block named '{block}'")]
    UnknownBlock { function: String, block: String },
}

/// Extract exactly `N` operands.
pub(crate) fn operands<const N: usize>(args: &[Value]) -> Result<&[Value; N], RuleError> {
    args.try_into().map_err(|_| RuleError::OperandCount {
        expected: N,
        found: args.len(),
    })
}

/// Redirect every use of `call` to `value`, then erase the call at `index`.
///
/// Returns the number of uses redirected.
pub fn splice(func: &mut Function, block: &str, index: usize, call: InstId, value: &Value) -> usize {
    debug_assert_eq!(func.block(block).and_then(|b| b.get(index)), Some(call));
    let uses = func.replace_all_uses(call, value);
    func.erase(block, index);
    uses
}

/// The lowering engine.
#[derive(Debug, Clone)]
pub struct Hoister<O = NoopObserver> {
    disabled: Vec<IntrinsicKind>,
    on_malformed: MalformedPolicy,
    observer: O,
}

impl Default for Hoister<NoopObserver> {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            on_malformed: MalformedPolicy::Abort,
            observer: NoopObserver,
        }
    }
}

impl Hoister<NoopObserver> {
    pub fn new(config: &HoistConfig) -> Self {
        Self {
            disabled: config.disabled.clone(),
            on_malformed: config.on_malformed,
            observer: NoopObserver,
        }
    }
}

impl<O: HoistObserver> Hoister<O> {
    /// Replace the observer.
    pub fn with_observer<P: HoistObserver>(self, observer: P) -> Hoister<P> {
        Hoister {
            disabled: self.disabled,
            on_malformed: self.on_malformed,
            observer,
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn is_enabled(&self, kind: IntrinsicKind) -> bool {
        !self.disabled.contains(&kind)
    }

    /// Lower every recognized call in every defined function.
    pub fn run_on_module(&mut self, module: &mut Module) -> Result<bool, HoistError> {
        let mut changed = false;
        for func in module.functions.values_mut() {
            changed |= self.run_on_function(func, &mut module.declarations)?;
        }
        Ok(changed)
    }

    /// Lower every recognized call in each block of `func`.
    pub fn run_on_function(
        &mut self,
        func: &mut Function,
        decls: &mut Declarations,
    ) -> Result<bool, HoistError> {
        let mut changed = false;
        for label in func.block_labels() {
            changed |= self.run_on_block(func, decls, &label)?;
        }
        Ok(changed)
    }

    /// Scan one block in program order and lower each recognized call.
    ///
    /// Returns whether the block was modified.
    pub fn run_on_block(
        &mut self,
        func: &mut Function,
        decls: &mut Declarations,
        label: &str,
    ) -> Result<bool, HoistError> {
        if func.block(label).is_none() {
            return Err(HoistError::UnknownBlock {
                function: func.name.clone(),
                block: label.to_string(),
            });
        }

        self.observer.block_start(func, label);
        let mut modified = false;
        let mut index = 0;

        while let Some(id) = func.block(label).and_then(|b| b.get(index)) {
            // Indirect calls have no name and are never candidates.
            let Some(name) = func.inst(id).and_then(|inst| inst.called_name()) else {
                index += 1;
                continue;
            };

            let Some(kind) = IntrinsicKind::from_name(name) else {
                if name.starts_with(TARGET_PREFIX) {
                    let name = name.to_string();
                    self.observer.intrinsic_skipped(func, label, &name, SkipReason::Unknown);
                }
                index += 1;
                continue;
            };

            self.observer.intrinsic_found(func, label, kind);
            if !self.is_enabled(kind) {
                self.observer.intrinsic_skipped(func, label, kind.name(), SkipReason::Disabled);
                index += 1;
                continue;
            }

            match self.rewrite(func, decls, label, index, kind) {
                Ok(next) => {
                    modified = true;
                    index = next;
                }
                Err(source) => {
                    let location = InstLocation {
                        function: func.name.clone(),
                        block: label.to_string(),
                        index,
                    };
                    match self.on_malformed {
                        MalformedPolicy::Abort => {
                            return Err(HoistError::Malformed {
                                kind,
                                location,
                                inst: inst_id_text(func, id),
                                source,
                            });
                        }
                        MalformedPolicy::Skip => {
                            log::warn!(
                                "leaving malformed call to {} at {}: {}",
                                kind.name(),
                                location,
                                source
                            );
                            self.observer.intrinsic_skipped(
                                func,
                                label,
                                kind.name(),
                                SkipReason::Malformed,
                            );
                            index += 1;
                        }
                    }
                }
            }
        }

        self.observer.block_done(func, label, modified);
        Ok(modified)
    }

    /// Lower the call at `index`. Returns the scan position after the splice.
    ///
    /// On error the block is left exactly as it was.
    fn rewrite(
        &mut self,
        func: &mut Function,
        decls: &mut Declarations,
        label: &str,
        index: usize,
        kind: IntrinsicKind,
    ) -> Result<usize, RuleError> {
        let Some(call) = func.block(label).and_then(|b| b.get(index)) else {
            return Ok(index + 1);
        };
        let Some(inst) = func.inst(call) else {
            return Ok(index + 1);
        };
        let args: Vec<Value> = inst.kind.operands().into_iter().cloned().collect();
        let result = inst.ty.clone();

        let mut builder = Builder::before(func, decls, label, index);
        let outcome = kind
            .validate(&builder, &args, &result)
            .and_then(|()| (kind.rule())(&mut builder, &args));
        let inserted = builder.into_inserted();

        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                for _ in 0..inserted.len() {
                    func.erase(label, index);
                }
                return Err(err);
            }
        };

        let call_index = index + inserted.len();
        splice(func, label, call_index, call, &value);
        self.observer.call_rewritten(func, label, kind, &inserted);
        Ok(call_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Callee, Constant, InstKind, Instruction};

    fn call(name: &str, ty: Type, args: Vec<Value>) -> Instruction {
        Instruction::new(
            Some("r".into()),
            ty,
            InstKind::Call { callee: Callee::Direct(name.into()), args },
        )
    }

    fn pmins_function() -> (Function, InstId) {
        let v8i16 = Type::vector(8, Type::i16());
        let mut func = Function::new("f", v8i16.clone());
        let a = func.add_param("a", v8i16.clone());
        let b = func.add_param("b", v8i16.clone());
        let r = func.append("entry", call("llvm.x86.sse2.pmins.w", v8i16, vec![a, b]));
        func.append("entry", Instruction::ret(Some(Value::Inst(r))));
        (func, r)
    }

    #[test]
    fn test_rewrites_and_splices() {
        let (mut func, r) = pmins_function();
        let mut decls = Declarations::new();

        let changed = Hoister::default().run_on_block(&mut func, &mut decls, "entry").unwrap();
        assert!(changed);
        assert!(func.inst(r).is_none());

        let block = func.block("entry").unwrap();
        assert_eq!(block.len(), 3);
        let select = block.insts()[1];
        let ret = func.inst(block.insts()[2]).unwrap();
        assert_eq!(ret.kind, InstKind::Ret { value: Some(Value::Inst(select)) });
    }

    #[test]
    fn test_disabled_rule_is_left_alone() {
        let (mut func, r) = pmins_function();
        let mut decls = Declarations::new();
        let config = HoistConfig {
            disabled: vec![IntrinsicKind::MinSignedWords],
            ..HoistConfig::default()
        };

        let changed = Hoister::new(&config).run_on_block(&mut func, &mut decls, "entry").unwrap();
        assert!(!changed);
        assert_eq!(func.block("entry").unwrap().get(0), Some(r));
    }

    #[test]
    fn test_malformed_call_is_atomic() {
        let v2f64 = Type::vector(2, Type::Double);
        let mut func = Function::new("f", v2f64.clone());
        let a = func.add_param("a", v2f64.clone());
        let p = func.add_param("p", Type::i8());
        let r = func.append("entry", call("llvm.x86.sse2.cmp.pd", v2f64, vec![a.clone(), a, p]));
        func.append("entry", Instruction::ret(Some(Value::Inst(r))));
        let before = func.to_string();
        let mut decls = Declarations::new();

        let err = Hoister::default().run_on_block(&mut func, &mut decls, "entry").unwrap_err();
        match &err {
            HoistError::Malformed { kind, location, source, .. } => {
                assert_eq!(*kind, IntrinsicKind::ComparePacked);
                assert_eq!(location.index, 0);
                assert_eq!(*source, RuleError::NonConstantPredicate { index: 2 });
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(func.to_string(), before);

        let skip = HoistConfig { on_malformed: MalformedPolicy::Skip, ..HoistConfig::default() };
        let changed = Hoister::new(&skip).run_on_block(&mut func, &mut decls, "entry").unwrap();
        assert!(!changed);
        assert_eq!(func.to_string(), before);
    }

    #[test]
    fn test_unknown_block() {
        let (mut func, _) = pmins_function();
        let mut decls = Declarations::new();
        let err = Hoister::default().run_on_block(&mut func, &mut decls, "nope").unwrap_err();
        assert!(matches!(err, HoistError::UnknownBlock { .. }));
    }

    #[test]
    fn test_operands_helper() {
        let args = [Value::Const(Constant::int(8, 1))];
        assert!(operands::<1>(&args).is_ok());
        assert_eq!(
            operands::<2>(&args),
            Err(RuleError::OperandCount { expected: 2, found: 1 })
        );
    }
}
