//! Byte packing and sign-mask extraction.

use super::{operands, RuleError};
use crate::ir::{Builder, Constant, IntPredicate, Type, Value};

/// `llvm.x86.sse2.packuswb.128`: low byte of every 16-bit lane, `a` then `b`.
///
/// Truncates instead of saturating.
pub fn pack_unsigned_bytes(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    let [x, y] = operands::<2>(args)?;
    let v16i8 = Type::vector(16, Type::i8());
    let bytes_x = b.bitcast(x.clone(), v16i8.clone(), "bytes.x");
    let bytes_y = b.bitcast(y.clone(), v16i8, "bytes.y");
    let mask = (0..16).map(|lane| Some(lane * 2)).collect();
    Ok(b.shuffle(bytes_x, bytes_y, mask, "packed"))
}

/// `llvm.x86.sse2.pmovmskb.128`: bit `i` of the result is the sign of byte `i`.
pub fn move_mask_bytes(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    let [x] = operands::<1>(args)?;
    let zero = Value::Const(Constant::splat(16, Constant::int(8, 0)));
    let signs = b.icmp(IntPredicate::Slt, x.clone(), zero, "signs");
    let bits = b.bitcast(signs, Type::i16(), "signs.bits");
    Ok(b.zext(bits, Type::i32(), "mask"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Declarations, Function, InstKind};

    #[test]
    fn test_pack_takes_even_bytes() {
        let ty = Type::vector(8, Type::i16());
        let mut func = Function::new("f", Type::vector(16, Type::i8()));
        let a = func.add_param("a", ty.clone());
        let c = func.add_param("c", ty);
        let mut decls = Declarations::new();

        let mut b = Builder::at_end(&mut func, &mut decls, "entry");
        let out = pack_unsigned_bytes(&mut b, &[a, c]).unwrap();
        assert_eq!(b.type_of(&out), Type::vector(16, Type::i8()));
        let inserted = b.into_inserted();
        assert_eq!(inserted.len(), 3);

        match &func.inst(inserted[2]).unwrap().kind {
            InstKind::ShuffleVector { mask, .. } => {
                assert_eq!(mask.first(), Some(&Some(0)));
                assert_eq!(mask.last(), Some(&Some(30)));
                assert_eq!(mask.len(), 16);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_movemask_shape() {
        let ty = Type::vector(16, Type::i8());
        let mut func = Function::new("f", Type::i32());
        let a = func.add_param("a", ty);
        let mut decls = Declarations::new();

        let mut b = Builder::at_end(&mut func, &mut decls, "entry");
        let out = move_mask_bytes(&mut b, &[a]).unwrap();
        assert_eq!(b.type_of(&out), Type::i32());
        let inserted = b.into_inserted();

        let types: Vec<_> = inserted.iter().map(|id| func.inst(*id).unwrap().ty.clone()).collect();
        assert_eq!(
            types,
            vec![Type::vector(16, Type::i1()), Type::i16(), Type::i32()]
        );
    }
}
