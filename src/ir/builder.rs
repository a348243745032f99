//! Instruction builder
//!
//! Inserts new instructions immediately before a fixed program point in
//! one block. Every inserted instruction is recorded so callers can report
//! exactly what a rewrite added.

use super::{
    BinOp, Callee, CastOp, Constant, Declarations, FloatPredicate, Function, InstId, InstKind,
    Instruction, IntPredicate, Signature, Type, Value,
};

pub struct Builder<'a> {
    func: &'a mut Function,
    decls: &'a mut Declarations,
    block: String,
    index: usize,
    inserted: Vec<InstId>,
}

impl<'a> Builder<'a> {
    /// Position a builder before the instruction at `index` of `block`.
    ///
    /// An index equal to the block length inserts at the end.
    pub fn before(
        func: &'a mut Function,
        decls: &'a mut Declarations,
        block: impl Into<String>,
        index: usize,
    ) -> Self {
        Self {
            func,
            decls,
            block: block.into(),
            index,
            inserted: Vec::new(),
        }
    }

    /// Position a builder at the end of `block`.
    pub fn at_end(func: &'a mut Function, decls: &'a mut Declarations, block: &str) -> Self {
        let index = func.block(block).map_or(0, |b| b.len());
        Self::before(func, decls, block, index)
    }

    pub fn function(&self) -> &Function {
        self.func
    }

    pub fn block(&self) -> &str {
        &self.block
    }

    /// Current insertion index (the position of the original program point).
    pub fn position(&self) -> usize {
        self.index
    }

    /// Instructions inserted so far, in program order.
    pub fn inserted(&self) -> &[InstId] {
        &self.inserted
    }

    pub fn into_inserted(self) -> Vec<InstId> {
        self.inserted
    }

    /// Type of a value. Unknown values yield `void`; the verifier reports them.
    pub fn type_of(&self, value: &Value) -> Type {
        self.func.value_type(value).unwrap_or(Type::Void)
    }

    fn push(&mut self, name: &str, ty: Type, kind: InstKind) -> Value {
        let name = if ty.is_void() { None } else { Some(name.to_string()) };
        let id = self.func.insert(&self.block, self.index, Instruction::new(name, ty, kind));
        self.index += 1;
        self.inserted.push(id);
        Value::Inst(id)
    }

    pub fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value, name: &str) -> Value {
        let ty = self.type_of(&lhs);
        self.push(name, ty, InstKind::Binary { op, lhs, rhs })
    }

    pub fn add(&mut self, lhs: Value, rhs: Value, name: &str) -> Value {
        self.binary(BinOp::Add, lhs, rhs, name)
    }

    pub fn sub(&mut self, lhs: Value, rhs: Value, name: &str) -> Value {
        self.binary(BinOp::Sub, lhs, rhs, name)
    }

    pub fn mul(&mut self, lhs: Value, rhs: Value, name: &str) -> Value {
        self.binary(BinOp::Mul, lhs, rhs, name)
    }

    pub fn and(&mut self, lhs: Value, rhs: Value, name: &str) -> Value {
        self.binary(BinOp::And, lhs, rhs, name)
    }

    pub fn shl(&mut self, lhs: Value, rhs: Value, name: &str) -> Value {
        self.binary(BinOp::Shl, lhs, rhs, name)
    }

    pub fn lshr(&mut self, lhs: Value, rhs: Value, name: &str) -> Value {
        self.binary(BinOp::LShr, lhs, rhs, name)
    }

    pub fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value, name: &str) -> Value {
        let ty = self.type_of(&lhs).with_element(Type::i1());
        self.push(name, ty, InstKind::ICmp { pred, lhs, rhs })
    }

    pub fn fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value, name: &str) -> Value {
        let ty = self.type_of(&lhs).with_element(Type::i1());
        self.push(name, ty, InstKind::FCmp { pred, lhs, rhs })
    }

    pub fn select(&mut self, cond: Value, on_true: Value, on_false: Value, name: &str) -> Value {
        let ty = self.type_of(&on_true);
        self.push(name, ty, InstKind::Select { cond, on_true, on_false })
    }

    /// Shuffle lanes of `lhs ++ rhs` by a constant mask.
    pub fn shuffle(&mut self, lhs: Value, rhs: Value, mask: Vec<Option<u32>>, name: &str) -> Value {
        let elem = self.type_of(&lhs).element().clone();
        let ty = Type::vector(mask.len() as u32, elem);
        self.push(name, ty, InstKind::ShuffleVector { lhs, rhs, mask })
    }

    /// Shuffle lanes of a single vector; the second source is `undef`.
    pub fn shuffle_lanes(&mut self, vector: Value, lanes: &[u32], name: &str) -> Value {
        let undef = Value::undef(self.type_of(&vector));
        let mask = lanes.iter().copied().map(Some).collect();
        self.shuffle(vector, undef, mask, name)
    }

    pub fn extract(&mut self, vector: Value, index: u32, name: &str) -> Value {
        let ty = self.type_of(&vector).element().clone();
        let index = Value::const_int(32, index as u64);
        self.push(name, ty, InstKind::ExtractElement { vector, index })
    }

    pub fn insert(&mut self, vector: Value, element: Value, index: u32, name: &str) -> Value {
        let ty = self.type_of(&vector);
        let index = Value::const_int(32, index as u64);
        self.push(name, ty, InstKind::InsertElement { vector, element, index })
    }

    pub fn cast(&mut self, op: CastOp, value: Value, ty: Type, name: &str) -> Value {
        self.push(name, ty, InstKind::Cast { op, value })
    }

    /// Bitcast; a cast to the value's own type returns the value unchanged.
    pub fn bitcast(&mut self, value: Value, ty: Type, name: &str) -> Value {
        if self.type_of(&value) == ty {
            return value;
        }
        self.cast(CastOp::BitCast, value, ty, name)
    }

    pub fn sext(&mut self, value: Value, ty: Type, name: &str) -> Value {
        self.cast(CastOp::SExt, value, ty, name)
    }

    pub fn zext(&mut self, value: Value, ty: Type, name: &str) -> Value {
        self.cast(CastOp::ZExt, value, ty, name)
    }

    /// Vector with `scalar` in every lane.
    ///
    /// Constant scalars fold to a constant vector; other scalars are
    /// inserted into lane 0 and broadcast with a zero shuffle mask.
    pub fn splat(&mut self, lanes: u32, scalar: Value, name: &str) -> Value {
        if let Value::Const(c) = &scalar {
            return Value::Const(Constant::splat(lanes, c.clone()));
        }
        let vec_ty = Type::vector(lanes, self.type_of(&scalar));
        let undef = Value::undef(vec_ty.clone());
        let head = self.insert(undef.clone(), scalar, 0, &format!("{}.insert", name));
        self.shuffle(head, undef, vec![Some(0); lanes as usize], name)
    }

    /// Call a portable intrinsic, declaring it on first use.
    pub fn call_intrinsic(&mut self, callee: &str, ret: Type, args: Vec<Value>, name: &str) -> Value {
        if !self.decls.contains_key(callee) {
            let params = args.iter().map(|a| self.type_of(a)).collect();
            self.decls
                .insert(callee.to_string(), Signature::new(ret.clone(), params));
        }
        let kind = InstKind::Call { callee: Callee::Direct(callee.to_string()), args };
        self.push(name, ret, kind)
    }
}
