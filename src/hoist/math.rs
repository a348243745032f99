//! Floating-point rules that map onto portable LLVM intrinsics.

use super::{operands, RuleError};
use crate::ir::{Builder, Type, Value};

pub const FMA_V2F64: &str = "llvm.fma.v2f64";
pub const SQRT_V2F64: &str = "llvm.sqrt.v2f64";

fn v2f64() -> Type {
    Type::vector(2, Type::Double)
}

/// `llvm.x86.fma.vfmadd.pd` → `llvm.fma.v2f64` (single rounding).
pub fn fused_multiply_add(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    let [x, y, z] = operands::<3>(args)?;
    Ok(b.call_intrinsic(FMA_V2F64, v2f64(), vec![x.clone(), y.clone(), z.clone()], "fma"))
}

/// `llvm.x86.sse2.sqrt.pd` → `llvm.sqrt.v2f64`.
pub fn sqrt(b: &mut Builder<'_>, args: &[Value]) -> Result<Value, RuleError> {
    let [x] = operands::<1>(args)?;
    Ok(b.call_intrinsic(SQRT_V2F64, v2f64(), vec![x.clone()], "sqrt"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Declarations, Function, Signature};

    #[test]
    fn test_fma_declares_portable_intrinsic() {
        let mut func = Function::new("f", v2f64());
        let a = func.add_param("a", v2f64());
        let mut decls = Declarations::new();

        let mut b = Builder::at_end(&mut func, &mut decls, "entry");
        let out = fused_multiply_add(&mut b, &[a.clone(), a.clone(), a]).unwrap();
        let inserted = b.into_inserted();

        assert_eq!(out, Value::Inst(inserted[0]));
        assert_eq!(func.inst(inserted[0]).unwrap().called_name(), Some(FMA_V2F64));
        assert_eq!(
            decls[FMA_V2F64],
            Signature::new(v2f64(), vec![v2f64(), v2f64(), v2f64()])
        );
    }

    #[test]
    fn test_sqrt() {
        let mut func = Function::new("f", v2f64());
        let a = func.add_param("a", v2f64());
        let mut decls = Declarations::new();

        let mut b = Builder::at_end(&mut func, &mut decls, "entry");
        sqrt(&mut b, &[a]).unwrap();
        assert_eq!(b.inserted().len(), 1);
        assert!(decls.contains_key(SQRT_V2F64));
    }
}
