//! Dead declaration elimination.
//!
//! Removes intrinsic declarations that no call references, which is what a
//! fully lowered module leaves behind. Other external declarations are kept.

use super::{ModulePass, PassContext};
use crate::ir::Module;
use crate::stats::Timer;
use anyhow::Result;

const INTRINSIC_PREFIX: &str = "llvm.";

pub struct StripDeadDeclarations;

impl ModulePass for StripDeadDeclarations {
    fn name(&self) -> &'static str {
        "strip-dead-declarations"
    }

    fn run(&mut self, module: &mut Module, cx: &mut PassContext) -> Result<bool> {
        let timer = Timer::start();
        let referenced = module.referenced_names();
        let before = module.declarations.len();

        module.declarations.retain(|name, _| {
            let keep = !name.starts_with(INTRINSIC_PREFIX) || referenced.contains(name);
            if !keep {
                log::debug!("removing unused declaration @{}", name);
            }
            keep
        });

        cx.stats.other_passes_time += timer.stop();
        Ok(module.declarations.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_strips_only_unused_intrinsics() {
        let mut module = parse(
            r#"
declare <2 x double> @llvm.sqrt.v2f64(<2 x double>)
declare <2 x double> @llvm.x86.sse2.sqrt.pd(<2 x double>)
declare void @external(i32)

define <2 x double> @f(<2 x double> %a) {
entry:
  %r = call <2 x double> @llvm.sqrt.v2f64(<2 x double> %a)
  ret <2 x double> %r
}
"#,
        )
        .unwrap();

        let changed = StripDeadDeclarations
            .run(&mut module, &mut PassContext::new())
            .unwrap();
        assert!(changed);
        let names: Vec<&str> = module.declarations.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["llvm.sqrt.v2f64", "external"]);

        let changed = StripDeadDeclarations
            .run(&mut module, &mut PassContext::new())
            .unwrap();
        assert!(!changed);
    }
}
