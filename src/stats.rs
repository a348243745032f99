//! Hoisting statistics.
//!
//! Tracks what the hoister did for verbose output and `--emit stats`.

use crate::hoist::{HoistObserver, IntrinsicKind, SkipReason};
use crate::ir::{Function, InstId, Module};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Hoisting statistics.
#[derive(Debug, Default, Clone, Serialize)]
pub struct HoistStats {
    /// Time spent parsing the input
    pub parse_time: Duration,
    /// Time spent in the hoisting pass
    pub hoist_time: Duration,
    /// Time spent in the remaining passes
    pub other_passes_time: Duration,
    /// Total time
    pub total_time: Duration,

    /// Number of defined functions
    pub num_functions: usize,
    /// Blocks scanned
    pub blocks_scanned: usize,
    /// Blocks with at least one rewrite
    pub blocks_modified: usize,
    /// Instructions before the pipeline
    pub num_insts_before: usize,
    /// Instructions after the pipeline
    pub num_insts_after: usize,
    /// Instructions inserted by rules
    pub insts_inserted: usize,

    /// Rewrites per intrinsic
    pub rewrites: BTreeMap<IntrinsicKind, usize>,
    /// Target intrinsics without a rule, by name
    pub unhandled: IndexMap<String, usize>,
    /// Recognized calls skipped because their rule is disabled
    pub skipped_disabled: usize,
    /// Recognized calls left in place under the skip policy
    pub skipped_malformed: usize,
}

impl HoistStats {
    /// Create a new stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rewritten calls.
    pub fn total_rewrites(&self) -> usize {
        self.rewrites.values().sum()
    }

    /// Record module size before the pipeline runs.
    pub fn record_before(&mut self, module: &Module) {
        self.num_functions = module.functions.len();
        self.num_insts_before = module.num_insts();
    }

    /// Record module size after the pipeline ran.
    pub fn record_after(&mut self, module: &Module) {
        self.num_insts_after = module.num_insts();
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Hoisting Statistics ===\n");
        out.push_str(&format!("Functions:    {}\n", self.num_functions));
        out.push_str(&format!(
            "Blocks:       {} scanned, {} modified\n",
            self.blocks_scanned, self.blocks_modified
        ));
        out.push_str(&format!(
            "Instructions: {} → {} ({} inserted)\n",
            self.num_insts_before, self.num_insts_after, self.insts_inserted
        ));
        out.push_str(&format!("Rewrites:     {}\n", self.total_rewrites()));
        for (kind, count) in &self.rewrites {
            out.push_str(&format!("  {:<26} {}\n", kind.id(), count));
        }
        if self.skipped_disabled > 0 {
            out.push_str(&format!("Disabled:     {}\n", self.skipped_disabled));
        }
        if self.skipped_malformed > 0 {
            out.push_str(&format!("Malformed:    {}\n", self.skipped_malformed));
        }
        if !self.unhandled.is_empty() {
            out.push_str("Unhandled target intrinsics:\n");
            for (name, count) in &self.unhandled {
                out.push_str(&format!("  {:<26} {}\n", name, count));
            }
        }
        out.push_str("\n=== Timing ===\n");
        out.push_str(&format!("Parsing:      {:?}\n", self.parse_time));
        out.push_str(&format!("Hoisting:     {:?}\n", self.hoist_time));
        out.push_str(&format!("Other passes: {:?}\n", self.other_passes_time));
        out.push_str(&format!("Total:        {:?}\n", self.total_time));
        out
    }

    /// Display statistics on stderr.
    pub fn display(&self) {
        eprintln!("\n{}", self.summary());
    }
}

impl HoistObserver for HoistStats {
    fn block_start(&mut self, _func: &Function, _block: &str) {
        self.blocks_scanned += 1;
    }

    fn intrinsic_skipped(&mut self, _func: &Function, _block: &str, name: &str, reason: SkipReason) {
        match reason {
            SkipReason::Unknown => *self.unhandled.entry(name.to_string()).or_default() += 1,
            SkipReason::Disabled => self.skipped_disabled += 1,
            SkipReason::Malformed => self.skipped_malformed += 1,
        }
    }

    fn call_rewritten(&mut self, _func: &Function, _block: &str, kind: IntrinsicKind, inserted: &[InstId]) {
        *self.rewrites.entry(kind).or_default() += 1;
        self.insts_inserted += inserted.len();
    }

    fn block_done(&mut self, _func: &Function, _block: &str, modified: bool) {
        if modified {
            self.blocks_modified += 1;
        }
    }
}

/// Timer helper for measuring phase durations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// Stop the timer and return elapsed duration.
    pub fn stop(&self) -> Duration {
        self.start.elapsed()
    }
}
