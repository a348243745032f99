//! Function representation

use super::{BasicBlock, InstId, Instruction, Type, Value};
use indexmap::IndexMap;
use std::collections::HashSet;

/// A formal parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// A function definition.
///
/// Instructions are stored in an arena (`insts`) indexed by [`InstId`];
/// erased slots are left empty so ids stay stable for the lifetime of the
/// function. Blocks keep their source order.
#[derive(Debug, Clone)]
pub struct Function {
    /// Function name (without `@`)
    pub name: String,
    /// Return type
    pub ret_ty: Type,
    /// Parameters
    pub params: Vec<Param>,
    blocks: IndexMap<String, BasicBlock>,
    insts: Vec<Option<Instruction>>,
    names: HashSet<String>,
}

impl Function {
    pub fn new(name: impl Into<String>, ret_ty: Type) -> Self {
        Self {
            name: name.into(),
            ret_ty,
            params: Vec::new(),
            blocks: IndexMap::new(),
            insts: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Add a parameter and return the value referring to it.
    pub fn add_param(&mut self, name: impl Into<String>, ty: Type) -> Value {
        let name = self.fresh_name(&name.into());
        self.names.insert(name.clone());
        self.params.push(Param { name, ty });
        Value::Arg(self.params.len() as u32 - 1)
    }

    /// Add an empty block. Adding an existing label is a no-op.
    pub fn add_block(&mut self, label: impl Into<String>) {
        let label = label.into();
        self.blocks
            .entry(label.clone())
            .or_insert_with(|| BasicBlock::new(label));
    }

    pub fn block(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.get(label)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.values()
    }

    /// Block labels in order.
    pub fn block_labels(&self) -> Vec<String> {
        self.blocks.keys().cloned().collect()
    }

    /// Entry block (first block)
    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.values().next()
    }

    pub fn inst(&self, id: InstId) -> Option<&Instruction> {
        self.insts.get(id.index()).and_then(Option::as_ref)
    }

    /// Live instructions in arena order (placed or not).
    pub fn insts(&self) -> impl Iterator<Item = (InstId, &Instruction)> {
        self.insts
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|inst| (InstId(i as u32), inst)))
    }

    /// Number of instructions placed in blocks.
    pub fn num_insts(&self) -> usize {
        self.blocks.values().map(BasicBlock::len).sum()
    }

    /// Return a name based on `hint` that no other value in this function uses.
    pub fn fresh_name(&self, hint: &str) -> String {
        if !hint.is_empty() && !self.names.contains(hint) {
            return hint.to_string();
        }
        let base = if hint.is_empty() { "t" } else { hint };
        let mut n = 0u32;
        loop {
            let candidate = format!("{}{}", base, n);
            if !self.names.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Put an instruction in the arena without placing it in a block.
    ///
    /// Clashing result names are renamed with [`Function::fresh_name`].
    pub fn create(&mut self, mut inst: Instruction) -> InstId {
        if let Some(name) = inst.name.take() {
            let name = self.fresh_name(&name);
            self.names.insert(name.clone());
            inst.name = Some(name);
        }
        self.insts.push(Some(inst));
        InstId(self.insts.len() as u32 - 1)
    }

    /// Create an instruction at the end of `label`, creating the block if needed.
    pub fn append(&mut self, label: &str, inst: Instruction) -> InstId {
        let id = self.create(inst);
        self.add_block(label);
        if let Some(block) = self.blocks.get_mut(label) {
            block.push(id);
        }
        id
    }

    /// Create an instruction at position `index` of `label`.
    ///
    /// An index past the end appends; a missing block is created.
    pub fn insert(&mut self, label: &str, index: usize, inst: Instruction) -> InstId {
        let id = self.create(inst);
        self.add_block(label);
        if let Some(block) = self.blocks.get_mut(label) {
            let index = index.min(block.len());
            block.insert(index, id);
        }
        id
    }

    /// Remove the instruction at `index` of `label` from its block and the arena.
    ///
    /// Uses of its result are not touched; callers redirect them first.
    pub fn erase(&mut self, label: &str, index: usize) -> Option<Instruction> {
        let block = self.blocks.get_mut(label)?;
        if index >= block.len() {
            return None;
        }
        let id = block.remove(index);
        let inst = self.insts.get_mut(id.index())?.take()?;
        if let Some(name) = &inst.name {
            self.names.remove(name);
        }
        Some(inst)
    }

    /// Redirect every use of `old` to `new`. Returns the number of operands rewritten.
    pub fn replace_all_uses(&mut self, old: InstId, new: &Value) -> usize {
        let mut rewritten = 0;
        for inst in self.insts.iter_mut().flatten() {
            for operand in inst.kind.operands_mut() {
                if *operand == Value::Inst(old) {
                    *operand = new.clone();
                    rewritten += 1;
                }
            }
        }
        rewritten
    }

    /// Instructions that use the result of `id`.
    pub fn users(&self, id: InstId) -> Vec<InstId> {
        self.insts()
            .filter(|(_, inst)| inst.inst_operands().contains(&id))
            .map(|(user, _)| user)
            .collect()
    }

    /// Type of a value in the context of this function.
    pub fn value_type(&self, value: &Value) -> Option<Type> {
        match value {
            Value::Inst(id) => self.inst(*id).map(|inst| inst.ty.clone()),
            Value::Arg(index) => self.params.get(*index as usize).map(|p| p.ty.clone()),
            Value::Global(_) => Some(Type::Ptr),
            Value::Const(c) => Some(c.ty()),
        }
    }
}
