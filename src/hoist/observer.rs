//! Hooks into the scan.
//!
//! Rules never print. Anything that wants to see what the hoister does
//! (logging, statistics, tests) implements [`HoistObserver`].

use super::IntrinsicKind;
use crate::ir::printer::{block_text, inst_id_text};
use crate::ir::{Function, InstId};

/// Why a call with a target name was not rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Target intrinsic with no rule
    Unknown,
    /// Rule disabled by configuration
    Disabled,
    /// Operands did not fit the rule and the policy is to skip
    Malformed,
}

pub trait HoistObserver {
    fn block_start(&mut self, _func: &Function, _block: &str) {}

    fn intrinsic_found(&mut self, _func: &Function, _block: &str, _kind: IntrinsicKind) {}

    fn intrinsic_skipped(&mut self, _func: &Function, _block: &str, _name: &str, _reason: SkipReason) {}

    /// `inserted` lists the new instructions in program order.
    fn call_rewritten(
        &mut self,
        _func: &Function,
        _block: &str,
        _kind: IntrinsicKind,
        _inserted: &[InstId],
    ) {
    }

    fn block_done(&mut self, _func: &Function, _block: &str, _modified: bool) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl HoistObserver for NoopObserver {}

/// Reports through the `log` facade.
///
/// Findings go to `debug`; whole-block dumps before and after rewriting go
/// to `trace`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl HoistObserver for LogObserver {
    fn block_start(&mut self, func: &Function, block: &str) {
        log::trace!("@{}: original block:\n{}", func.name, block_text(func, block));
    }

    fn intrinsic_found(&mut self, func: &Function, block: &str, kind: IntrinsicKind) {
        log::debug!("@{} {}: found intrinsic {}", func.name, block, kind.name());
    }

    fn intrinsic_skipped(&mut self, func: &Function, block: &str, name: &str, reason: SkipReason) {
        match reason {
            SkipReason::Unknown => {
                log::debug!("@{} {}: no lowering for target intrinsic {}", func.name, block, name)
            }
            SkipReason::Disabled => {
                log::debug!("@{} {}: lowering of {} is disabled", func.name, block, name)
            }
            SkipReason::Malformed => {
                log::debug!("@{} {}: left malformed call to {}", func.name, block, name)
            }
        }
    }

    fn call_rewritten(&mut self, func: &Function, block: &str, kind: IntrinsicKind, inserted: &[InstId]) {
        log::debug!(
            "@{} {}: lowered {} into {} instructions",
            func.name,
            block,
            kind.name(),
            inserted.len()
        );
        if let Some(&result) = inserted.last() {
            for user in func.users(result) {
                log::trace!("@{} {}: result used by {}", func.name, block, inst_id_text(func, user));
            }
        }
    }

    fn block_done(&mut self, func: &Function, block: &str, modified: bool) {
        if modified {
            log::trace!("@{}: modified block:\n{}", func.name, block_text(func, block));
        }
    }
}

impl<T: HoistObserver + ?Sized> HoistObserver for &mut T {
    fn block_start(&mut self, func: &Function, block: &str) {
        (**self).block_start(func, block)
    }

    fn intrinsic_found(&mut self, func: &Function, block: &str, kind: IntrinsicKind) {
        (**self).intrinsic_found(func, block, kind)
    }

    fn intrinsic_skipped(&mut self, func: &Function, block: &str, name: &str, reason: SkipReason) {
        (**self).intrinsic_skipped(func, block, name, reason)
    }

    fn call_rewritten(&mut self, func: &Function, block: &str, kind: IntrinsicKind, inserted: &[InstId]) {
        (**self).call_rewritten(func, block, kind, inserted)
    }

    fn block_done(&mut self, func: &Function, block: &str, modified: bool) {
        (**self).block_done(func, block, modified)
    }
}

/// Fan out to two observers, first `A` then `B`.
impl<A: HoistObserver, B: HoistObserver> HoistObserver for (A, B) {
    fn block_start(&mut self, func: &Function, block: &str) {
        self.0.block_start(func, block);
        self.1.block_start(func, block);
    }

    fn intrinsic_found(&mut self, func: &Function, block: &str, kind: IntrinsicKind) {
        self.0.intrinsic_found(func, block, kind);
        self.1.intrinsic_found(func, block, kind);
    }

    fn intrinsic_skipped(&mut self, func: &Function, block: &str, name: &str, reason: SkipReason) {
        self.0.intrinsic_skipped(func, block, name, reason);
        self.1.intrinsic_skipped(func, block, name, reason);
    }

    fn call_rewritten(&mut self, func: &Function, block: &str, kind: IntrinsicKind, inserted: &[InstId]) {
        self.0.call_rewritten(func, block, kind, inserted);
        self.1.call_rewritten(func, block, kind, inserted);
    }

    fn block_done(&mut self, func: &Function, block: &str, modified: bool) {
        self.0.block_done(func, block, modified);
        self.1.block_done(func, block, modified);
    }
}
