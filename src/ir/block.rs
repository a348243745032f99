//! Basic block representation

use super::InstId;

/// An ordered list of instructions.
///
/// The block owns the *placement* of its instructions; their payloads live
/// in the enclosing function's arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    label: String,
    insts: Vec<InstId>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            insts: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }

    pub fn get(&self, index: usize) -> Option<InstId> {
        self.insts.get(index).copied()
    }

    pub(crate) fn push(&mut self, id: InstId) {
        self.insts.push(id);
    }

    pub(crate) fn insert(&mut self, index: usize, id: InstId) {
        self.insts.insert(index, id);
    }

    pub(crate) fn remove(&mut self, index: usize) -> InstId {
        self.insts.remove(index)
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = InstId> + '_ {
        self.insts.iter().copied()
    }

    /// Last instruction (the terminator in a well-formed block).
    pub fn last(&self) -> Option<InstId> {
        self.insts.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_basic() {
        let mut block = BasicBlock::new("entry");
        assert!(block.is_empty());

        block.push(InstId(0));
        block.push(InstId(2));
        block.insert(1, InstId(1));
        assert_eq!(block.insts(), &[InstId(0), InstId(1), InstId(2)]);
        assert_eq!(block.get(2), Some(InstId(2)));

        assert_eq!(block.remove(0), InstId(0));
        assert_eq!(block.len(), 2);
        assert_eq!(block.last(), Some(InstId(2)));
    }
}
