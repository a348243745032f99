//! Module pass pipeline.
//!
//! Passes are registered explicitly at an extension point ([`Stage`]) and
//! run ordered by stage, then by registration order. There is no global
//! registry: whoever builds the [`Pipeline`] decides what runs.

mod dead_decls;

pub use dead_decls::StripDeadDeclarations;

use crate::config::{HoistConfig, Stage};
use crate::hoist::{Hoister, LogObserver};
use crate::ir::verify::verify_module;
use crate::ir::Module;
use crate::stats::{HoistStats, Timer};
use anyhow::{bail, Result};

/// State shared by the passes of one pipeline run.
#[derive(Debug, Default)]
pub struct PassContext {
    pub stats: HoistStats,
}

impl PassContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A transformation or analysis over a whole module.
pub trait ModulePass {
    /// Name of the pass for logging.
    fn name(&self) -> &'static str;

    /// Run the pass. Returns true if the module was modified.
    fn run(&mut self, module: &mut Module, cx: &mut PassContext) -> Result<bool>;
}

/// Ordered set of passes.
#[derive(Default)]
pub struct Pipeline {
    passes: Vec<(Stage, Box<dyn ModulePass>)>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pipeline described by `config`.
    pub fn standard(config: &HoistConfig) -> Self {
        let mut pipeline = Self::new();
        pipeline.register(config.stage, IntrinsicHoisting::new(config));
        if config.strip_dead_declarations {
            pipeline.register(Stage::OptimizerLast, StripDeadDeclarations);
        }
        if config.verify {
            pipeline.register(Stage::OptimizerLast, Verify);
        }
        pipeline
    }

    /// Add a pass at an extension point.
    pub fn register(&mut self, stage: Stage, pass: impl ModulePass + 'static) {
        self.passes.push((stage, Box::new(pass)));
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Pass names in execution order.
    pub fn schedule(&self) -> Vec<(Stage, &'static str)> {
        self.order()
            .into_iter()
            .map(|i| (self.passes[i].0, self.passes[i].1.name()))
            .collect()
    }

    fn order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.passes.len()).collect();
        // Stable: registration order is kept within a stage.
        order.sort_by_key(|&i| self.passes[i].0);
        order
    }

    /// Run every pass. Returns true if any pass modified the module.
    pub fn run(&mut self, module: &mut Module, cx: &mut PassContext) -> Result<bool> {
        log::debug!("pass schedule: {:?}", self.schedule());
        let mut changed = false;
        for i in self.order() {
            let (stage, pass) = &mut self.passes[i];
            let modified = pass.run(module, cx)?;
            log::debug!("[{}] pass '{}' changed={}", stage, pass.name(), modified);
            changed |= modified;
        }
        Ok(changed)
    }
}

/// Lowers recognized target intrinsics.
pub struct IntrinsicHoisting {
    config: HoistConfig,
}

impl IntrinsicHoisting {
    pub fn new(config: &HoistConfig) -> Self {
        Self { config: config.clone() }
    }
}

impl ModulePass for IntrinsicHoisting {
    fn name(&self) -> &'static str {
        "intrinsic-hoisting"
    }

    fn run(&mut self, module: &mut Module, cx: &mut PassContext) -> Result<bool> {
        let timer = Timer::start();
        let mut hoister = Hoister::new(&self.config).with_observer((LogObserver, &mut cx.stats));
        let changed = hoister.run_on_module(module)?;
        cx.stats.hoist_time += timer.stop();
        Ok(changed)
    }
}

/// Fails the pipeline if the module is not well formed.
pub struct Verify;

impl ModulePass for Verify {
    fn name(&self) -> &'static str {
        "verify"
    }

    fn run(&mut self, module: &mut Module, cx: &mut PassContext) -> Result<bool> {
        let timer = Timer::start();
        let problems = verify_module(module);
        cx.stats.other_passes_time += timer.stop();

        if !problems.is_empty() {
            let listing: Vec<String> = problems.iter().map(|p| format!("  {}", p)).collect();
            bail!(
                "module '{}' failed verification ({} problems):\n{}",
                module.name,
                problems.len(),
                listing.join("\n")
            );
        }
        Ok(false)
    }
}
