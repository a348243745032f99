//! Intrinsic hoisting for LLVM-style IR
//!
//! Rewrites calls to a fixed set of x86 SSE2/FMA intrinsics into sequences
//! of portable vector instructions (shuffles, lane-wise arithmetic,
//! compares, selects and casts), so code that used target-specific
//! intrinsics can be compiled for other vector targets.
//!
//! # Example
//!
//! ```
//! use intrinsic_hoist::{hoist_source, HoistConfig};
//!
//! let source = r#"
//! declare <8 x i16> @llvm.x86.sse2.pmins.w(<8 x i16>, <8 x i16>)
//!
//! define <8 x i16> @min(<8 x i16> %a, <8 x i16> %b) {
//! entry:
//!   %r = call <8 x i16> @llvm.x86.sse2.pmins.w(<8 x i16> %a, <8 x i16> %b)
//!   ret <8 x i16> %r
//! }
//! "#;
//!
//! let (module, stats) = hoist_source(source, &HoistConfig::default()).unwrap();
//! assert_eq!(stats.total_rewrites(), 1);
//! assert!(module.to_string().contains("select"));
//! ```

pub mod config;
pub mod hoist;
pub mod interp;
pub mod ir;
pub mod parser;
pub mod pass;
pub mod stats;

pub use config::{HoistConfig, MalformedPolicy, Stage};
pub use hoist::{HoistError, HoistObserver, Hoister, IntrinsicKind, RuleError};
pub use ir::Module;
pub use pass::{ModulePass, PassContext, Pipeline};
pub use stats::HoistStats;

use anyhow::{Context, Result};
use stats::Timer;
use std::path::Path;

/// Parse `source`, run the standard pipeline for `config`, and return the
/// lowered module with the statistics of the run.
pub fn hoist_source(source: &str, config: &HoistConfig) -> Result<(Module, HoistStats)> {
    let total = Timer::start();
    config.validate()?;

    let timer = Timer::start();
    let mut module = parser::parse(source)?;
    let parse_time = timer.stop();

    let mut cx = PassContext::new();
    cx.stats.parse_time = parse_time;
    cx.stats.record_before(&module);

    Pipeline::standard(config).run(&mut module, &mut cx)?;

    cx.stats.record_after(&module);
    cx.stats.total_time = total.stop();
    Ok((module, cx.stats))
}

/// Like [`hoist_source`], reading the IR from a file.
pub fn hoist_file(path: &Path, config: &HoistConfig) -> Result<(Module, HoistStats)> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let (mut module, stats) = hoist_source(&source, config)
        .with_context(|| format!("Failed to hoist {}", path.display()))?;
    if module.name.is_empty() {
        module.name = path.display().to_string();
    }
    Ok((module, stats))
}
