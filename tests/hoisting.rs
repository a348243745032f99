//! Integration tests for the hoisting pipeline
//!
//! These drive the public entry points on textual modules and check the
//! structure of what comes out.

use intrinsic_hoist::hoist::{OperandClass, TARGET_PREFIX};
use intrinsic_hoist::ir::Module;
use intrinsic_hoist::parser::parse;
use intrinsic_hoist::{hoist_source, HoistConfig, Hoister, IntrinsicKind, MalformedPolicy};

/// A module with one function `@f` that calls `kind` once and returns the result.
fn single_call_module(kind: IntrinsicKind) -> String {
    let sig = kind.signature();
    let mut params = Vec::new();
    let mut args = Vec::new();
    for (i, (class, ty)) in kind.operands().iter().zip(&sig.params).enumerate() {
        if *class == OperandClass::Predicate {
            args.push(format!("{} 1", ty));
        } else {
            params.push(format!("{} %p{}", ty, i));
            args.push(format!("{} %p{}", ty, i));
        }
    }
    let decl: Vec<String> = sig.params.iter().map(|t| t.to_string()).collect();
    format!(
        "declare {ret} @{name}({decl})\n\n\
         define {ret} @f({params}) {{\n\
         entry:\n  %r = call {ret} @{name}({args})\n  ret {ret} %r\n}}\n",
        ret = sig.ret,
        name = kind.name(),
        decl = decl.join(", "),
        params = params.join(", "),
        args = args.join(", "),
    )
}

fn calls_to_target(module: &Module) -> usize {
    module
        .functions
        .values()
        .flat_map(|f| f.insts().map(|(_, inst)| inst.called_name().map(str::to_string)))
        .flatten()
        .filter(|name| name.starts_with(TARGET_PREFIX))
        .count()
}

/// Every recognized intrinsic is lowered away and the result verifies.
#[test]
fn test_every_kind_is_lowered() {
    for kind in IntrinsicKind::ALL {
        let source = single_call_module(kind);
        let (module, stats) = hoist_source(&source, &HoistConfig::default())
            .unwrap_or_else(|e| panic!("{}: {:#}", kind.id(), e));

        assert_eq!(calls_to_target(&module), 0, "{} left a target call", kind.id());
        assert_eq!(stats.rewrites.get(&kind), Some(&1), "{}", kind.id());
        assert!(
            !module.declarations.contains_key(kind.name()),
            "{} declaration should be stripped",
            kind.id()
        );
    }
}

/// fma and sqrt lower to the portable math intrinsics, which get declared.
#[test]
fn test_math_intrinsics_declared() {
    let (module, _) =
        hoist_source(&single_call_module(IntrinsicKind::FusedMultiplyAdd), &HoistConfig::default())
            .unwrap();
    assert!(module.declarations.contains_key("llvm.fma.v2f64"));

    let (module, _) =
        hoist_source(&single_call_module(IntrinsicKind::Sqrt), &HoistConfig::default()).unwrap();
    assert!(module.declarations.contains_key("llvm.sqrt.v2f64"));
}

/// A module with no target intrinsics comes out unchanged.
#[test]
fn test_pass_through() {
    let source = r#"
declare <2 x i64> @helper(<2 x i64>)

define <2 x i64> @f(<2 x i64> %a, <2 x i64> %b) {
entry:
  %x = add <2 x i64> %a, %b
  %y = call <2 x i64> @helper(<2 x i64> %x)
  ret <2 x i64> %y
}
"#;
    let before = parse(source).unwrap().to_string();
    let (module, stats) = hoist_source(source, &HoistConfig::default()).unwrap();
    assert_eq!(module.to_string(), before);
    assert_eq!(stats.total_rewrites(), 0);
    assert_eq!(stats.blocks_modified, 0);
    assert!(module.declarations.contains_key("helper"));
}

/// Hoisting already-hoisted output changes nothing.
#[test]
fn test_idempotent() {
    for kind in IntrinsicKind::ALL {
        let (once, _) = hoist_source(&single_call_module(kind), &HoistConfig::default()).unwrap();
        let printed = once.to_string();
        let (twice, stats) = hoist_source(&printed, &HoistConfig::default()).unwrap();
        assert_eq!(twice.to_string(), printed, "{}", kind.id());
        assert_eq!(stats.total_rewrites(), 0);
    }
}

/// Printed output parses back to the same text.
#[test]
fn test_output_reparses() {
    for kind in IntrinsicKind::ALL {
        let (module, _) = hoist_source(&single_call_module(kind), &HoistConfig::default()).unwrap();
        let printed = module.to_string();
        let reparsed = parse(&printed).unwrap_or_else(|e| panic!("{}: {}\n{}", kind.id(), e, printed));
        assert_eq!(reparsed.to_string(), printed);
    }
}

/// Every use of a call result, in any block, is redirected to the lowered value.
#[test]
fn test_uses_in_other_blocks() {
    let source = r#"
declare <8 x i16> @llvm.x86.sse2.pmins.w(<8 x i16>, <8 x i16>)
declare void @sink(<8 x i16>)

define <8 x i16> @f(<8 x i16> %a, <8 x i16> %b, i1 %c) {
entry:
  %m = call <8 x i16> @llvm.x86.sse2.pmins.w(<8 x i16> %a, <8 x i16> %b)
  call void @sink(<8 x i16> %m)
  br i1 %c, label %left, label %right

left:
  %l = add <8 x i16> %m, %m
  ret <8 x i16> %l

right:
  ret <8 x i16> %m
}
"#;
    let (module, stats) = hoist_source(source, &HoistConfig::default()).unwrap();
    let printed = module.to_string();
    assert_eq!(stats.total_rewrites(), 1);
    assert!(!printed.contains("%m ="));
    assert!(!printed.contains("%m,"));
    assert!(printed.contains("call void @sink(<8 x i16> %min"), "{}", printed);
    assert!(printed.contains("ret <8 x i16> %min"), "{}", printed);
}

/// Loads, stores, globals and phis around a lowered call are kept as
/// written; the phi and the store pick up the lowered value.
#[test]
fn test_memory_and_phi_around_call() {
    let source = r#"
@bias = global <8 x i16> zeroinitializer, align 16

declare <8 x i16> @llvm.x86.sse2.pmins.w(<8 x i16>, <8 x i16>)

define <8 x i16> @f(ptr %p, i32 %n) {
entry:
  %slot = alloca <8 x i16>, align 16
  %a = load <8 x i16>, ptr %p, align 16
  br label %loop

loop:
  %acc = phi <8 x i16> [ %a, %entry ], [ %m, %loop ]
  %i = phi i32 [ 0, %entry ], [ %next, %loop ]
  %b = load <8 x i16>, ptr @bias, align 16
  %m = call <8 x i16> @llvm.x86.sse2.pmins.w(<8 x i16> %acc, <8 x i16> %b)
  store <8 x i16> %m, ptr %slot, align 16
  %next = add i32 %i, 1
  %done = icmp eq i32 %next, %n
  br i1 %done, label %exit, label %loop

exit:
  %out = load <8 x i16>, ptr %slot, align 16
  ret <8 x i16> %out
}
"#;
    let (module, stats) = hoist_source(source, &HoistConfig::default()).unwrap();
    assert_eq!(stats.total_rewrites(), 1);
    assert_eq!(calls_to_target(&module), 0);

    let printed = module.to_string();
    for line in [
        "@bias = global <8 x i16> zeroinitializer, align 16\n",
        "  %slot = alloca <8 x i16>, align 16\n",
        "  %a = load <8 x i16>, ptr %p, align 16\n",
        "  %acc = phi <8 x i16> [%a, %entry], [%min, %loop]\n",
        "  %i = phi i32 [0, %entry], [%next, %loop]\n",
        "  %b = load <8 x i16>, ptr @bias, align 16\n",
        "  %less = icmp slt <8 x i16> %acc, %b\n",
        "  store <8 x i16> %min, ptr %slot, align 16\n",
        "  %out = load <8 x i16>, ptr %slot, align 16\n",
    ] {
        assert!(printed.contains(line), "missing {:?} in\n{}", line, printed);
    }
    assert!(!printed.contains("%m,"), "{}", printed);
    assert_eq!(parse(&printed).unwrap().to_string(), printed);
}

/// Calls in several blocks and functions are all lowered; instructions
/// around them keep their order.
#[test]
fn test_multiple_blocks_and_functions() {
    let source = r#"
declare <2 x i64> @llvm.x86.sse2.psll.q(<2 x i64>, <2 x i64>)
declare <2 x i64> @llvm.x86.sse2.psrl.q(<2 x i64>, <2 x i64>)

define <2 x i64> @g(<2 x i64> %a, <2 x i64> %n) {
entry:
  %first = xor <2 x i64> %a, %n
  %s0 = call <2 x i64> @llvm.x86.sse2.psll.q(<2 x i64> %first, <2 x i64> %n)
  %s1 = call <2 x i64> @llvm.x86.sse2.psrl.q(<2 x i64> %s0, <2 x i64> %n)
  br label %next

next:
  %s2 = call <2 x i64> @llvm.x86.sse2.psll.q(<2 x i64> %s1, <2 x i64> %n)
  %last = or <2 x i64> %s2, %a
  ret <2 x i64> %last
}

define <2 x i64> @h(<2 x i64> %a) {
entry:
  %s = call <2 x i64> @llvm.x86.sse2.psrl.q(<2 x i64> %a, <2 x i64> %a)
  ret <2 x i64> %s
}
"#;
    let (module, stats) = hoist_source(source, &HoistConfig::default()).unwrap();
    assert_eq!(stats.total_rewrites(), 4);
    assert_eq!(stats.rewrites.get(&IntrinsicKind::ShiftLeftQuad), Some(&2));
    assert_eq!(stats.rewrites.get(&IntrinsicKind::ShiftRightQuad), Some(&2));
    assert_eq!(stats.blocks_modified, 3);
    assert_eq!(calls_to_target(&module), 0);
    assert!(module.declarations.is_empty());

    let g = module.function("g").unwrap();
    let entry = g.block("entry").unwrap();
    let first = g.inst(entry.get(0).unwrap()).unwrap();
    assert_eq!(first.name.as_deref(), Some("first"));
    let next = g.block("next").unwrap();
    let last = g.inst(next.get(next.len() - 2).unwrap()).unwrap();
    assert_eq!(last.name.as_deref(), Some("last"));
}

/// Unknown target intrinsics are left alone and counted.
#[test]
fn test_unknown_target_intrinsic_untouched() {
    let source = r#"
declare <4 x float> @llvm.x86.sse.rcp.ps(<4 x float>)
declare <8 x i16> @llvm.x86.sse2.pmins.w(<8 x i16>, <8 x i16>)

define <4 x float> @f(<4 x float> %x, <8 x i16> %a) {
entry:
  %r = call <4 x float> @llvm.x86.sse.rcp.ps(<4 x float> %x)
  %m = call <8 x i16> @llvm.x86.sse2.pmins.w(<8 x i16> %a, <8 x i16> %a)
  %r2 = call <4 x float> @llvm.x86.sse.rcp.ps(<4 x float> %r)
  ret <4 x float> %r2
}
"#;
    let (module, stats) = hoist_source(source, &HoistConfig::default()).unwrap();
    assert_eq!(stats.total_rewrites(), 1);
    assert_eq!(stats.unhandled.get("llvm.x86.sse.rcp.ps"), Some(&2));
    assert_eq!(calls_to_target(&module), 2);
    assert!(module.declarations.contains_key("llvm.x86.sse.rcp.ps"));
    assert!(!module.declarations.contains_key("llvm.x86.sse2.pmins.w"));
}

/// A disabled rule leaves its calls in place and keeps the declaration.
#[test]
fn test_disabled_rule() {
    let source = single_call_module(IntrinsicKind::PackUnsignedBytes);
    let config = HoistConfig::preset("exact").unwrap();
    let (module, stats) = hoist_source(&source, &config).unwrap();
    assert_eq!(stats.total_rewrites(), 0);
    assert_eq!(stats.skipped_disabled, 1);
    assert_eq!(calls_to_target(&module), 1);
    assert!(module.declarations.contains_key("llvm.x86.sse2.packuswb.128"));

    let mut config = HoistConfig::default();
    config.disable(IntrinsicKind::MinSignedWords);
    let (_, stats) = hoist_source(&source, &config).unwrap();
    assert_eq!(stats.rewrites.get(&IntrinsicKind::PackUnsignedBytes), Some(&1));
}

const MALFORMED: &str = r#"
declare <2 x i64> @llvm.x86.sse2.psll.q(<4 x i32>, <2 x i64>)

define <2 x i64> @bad(<4 x i32> %a, <2 x i64> %n) {
entry:
  %x = add <2 x i64> %n, %n
  br label %body

body:
  %s = call <2 x i64> @llvm.x86.sse2.psll.q(<4 x i32> %a, <2 x i64> %x)
  ret <2 x i64> %s
}
"#;

/// Under the abort policy, a malformed call fails the run and says where.
#[test]
fn test_malformed_abort_names_location() {
    let err = hoist_source(MALFORMED, &HoistConfig::default()).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("llvm.x86.sse2.psll.q"), "{}", message);
    assert!(message.contains("@bad"), "{}", message);
    assert!(message.contains("block 'body'"), "{}", message);
    assert!(message.contains("instruction 0"), "{}", message);
    assert!(message.contains("operand 0"), "{}", message);
}

/// Under the skip policy, the malformed call stays and nothing else breaks.
#[test]
fn test_malformed_skip_leaves_call() {
    let config = HoistConfig { on_malformed: MalformedPolicy::Skip, ..HoistConfig::default() };
    let before = parse(MALFORMED).unwrap().to_string();
    let (module, stats) = hoist_source(MALFORMED, &config).unwrap();
    assert_eq!(stats.skipped_malformed, 1);
    assert_eq!(stats.total_rewrites(), 0);
    assert_eq!(module.to_string(), before);
}

/// A failed rule leaves no partial rewrite behind, even when driven directly.
#[test]
fn test_malformed_rolls_back() {
    let mut module = parse(MALFORMED).unwrap();
    let before = module.to_string();
    let mut hoister = Hoister::new(&HoistConfig::default());
    assert!(hoister.run_on_module(&mut module).is_err());
    assert_eq!(module.to_string(), before);
}

/// Compare intrinsics need a constant predicate.
#[test]
fn test_non_constant_predicate_is_malformed() {
    let source = r#"
declare <2 x double> @llvm.x86.sse2.cmp.pd(<2 x double>, <2 x double>, i8)

define <2 x double> @f(<2 x double> %a, <2 x double> %b, i8 %p) {
entry:
  %c = call <2 x double> @llvm.x86.sse2.cmp.pd(<2 x double> %a, <2 x double> %b, i8 %p)
  ret <2 x double> %c
}
"#;
    let message = format!("{:#}", hoist_source(source, &HoistConfig::default()).unwrap_err());
    assert!(message.contains("predicate"), "{}", message);
}

/// Keeping declarations and skipping the verifier are honored.
#[test]
fn test_pipeline_switches() {
    let config = HoistConfig { strip_dead_declarations: false, verify: false, ..HoistConfig::default() };
    let (module, stats) = hoist_source(&single_call_module(IntrinsicKind::Sqrt), &config).unwrap();
    assert_eq!(stats.total_rewrites(), 1);
    assert!(module.declarations.contains_key("llvm.x86.sse2.sqrt.pd"));
    assert!(module.declarations.contains_key("llvm.sqrt.v2f64"));
}

/// Instruction accounting adds up.
#[test]
fn test_instruction_counts() {
    let (_, stats) =
        hoist_source(&single_call_module(IntrinsicKind::MinSignedWords), &HoistConfig::default())
            .unwrap();
    assert_eq!(stats.num_functions, 1);
    assert_eq!(stats.num_insts_before, 2);
    assert_eq!(stats.insts_inserted, 2);
    assert_eq!(stats.num_insts_after, 3);
}
