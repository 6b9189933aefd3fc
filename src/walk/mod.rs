//! Heuristic stack walker.
//!
//! There is no frame pointer chain and no unwind info, so every frame is recovered by
//! looking at the prologue of the function it is in (see [`prologue`]): the prologue tells us
//! where the return address was spilled and how large the frame is, which gives us the caller's
//! PC and stack pointer. Repeat until a function doesn't look like it has a prologue.

#[cfg(test)]
mod fixture;
pub mod prologue;

use alloc::vec::Vec;
use core::fmt;

use crate::arch::Reg;
use crate::config::Limits;
use crate::diag::Diagnostic;
use crate::host::Cpu;
use prologue::{analyze_fn, PrologueInfo, ScanStop};

/// `jal` returns past its delay slot, so subtract this to point back at the call.
const CALL_RETURN_OFFSET: u32 = 8;

/// A best-effort list of PCs, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backtrace {
    /// Never empty, `pcs[0]` is the exact PC of the snapshot.
    pcs: Vec<u32>,
    diagnostics: Vec<Diagnostic>,
}

impl Backtrace {
    pub fn pcs(&self) -> &[u32] {
        &self.pcs
    }

    /// Everything that went wrong while collecting the PCs.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn pc(&self) -> u32 {
        self.pcs[0]
    }

    /// Callers of the current function, innermost first.
    pub fn callers(&self) -> &[u32] {
        &self.pcs[1..]
    }

    /// Whether the walk stopped because it hit the frame cap.
    pub fn is_truncated(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| matches!(diag, Diagnostic::FrameCapExceeded { .. }))
    }
}

impl fmt::Display for Backtrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PC: 0x{:08X}", self.pc())?;
        for pc in self.callers() {
            writeln!(f, "<- 0x{pc:08X}")?;
        }
        Ok(())
    }
}

/// Walks stacks with a fixed set of [`Limits`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Walker {
    limits: Limits,
}

impl Walker {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Collects the call stack of `cpu`. Never fails: anything unexpected just ends the
    /// backtrace early and is recorded in [`Backtrace::diagnostics`].
    #[instrument(level = "debug", skip_all, fields(pc = cpu.pc()))]
    pub fn walk<C: Cpu + ?Sized>(&self, cpu: &C) -> Backtrace {
        let mut diagnostics = Vec::new();
        let mut pcs = Vec::with_capacity(self.limits.frame_cap.min(64));
        pcs.push(cpu.pc());

        // What we know without unwinding anything.
        let mut pc = cpu.reg(Reg::RA);
        let mut sp = cpu.reg(Reg::SP);

        // The innermost function may or may not have run its prologue yet. If it did spill ra,
        // the register may already have been clobbered by a call, so trust the stack instead.
        let leaf = self.analyze(cpu, cpu.pc(), &mut diagnostics);
        if let Some(offset) = leaf.ra_save_offset {
            pc = cpu.read_u32(sp.wrapping_add(u32::from(offset)));
        }
        if let Some(size) = leaf.frame_size {
            sp = sp.wrapping_sub(size as i32 as u32);
        }

        loop {
            if pcs.len() >= self.limits.frame_cap {
                let diag = Diagnostic::FrameCapExceeded {
                    cap: self.limits.frame_cap,
                };
                warn!("{diag}");
                diagnostics.push(diag);
                break;
            }
            pcs.push(pc);

            let info = self.analyze(cpu, pc, &mut diagnostics);
            let Some((offset, size)) = info.frame() else {
                debug!(frames = pcs.len(), "no prologue for {pc:#010x}, stopping");
                break;
            };

            let ra = cpu.read_u32(sp.wrapping_add(u32::from(offset)));
            let Some(caller) = ra.checked_sub(CALL_RETURN_OFFSET) else {
                debug!(frames = pcs.len(), "return address {ra:#x} is below zero, stopping");
                break;
            };
            pc = caller;
            sp = sp.wrapping_sub(size as i32 as u32);
            debug!("unwound to pc={pc:#010x} sp={sp:#010x}");
        }

        Backtrace { pcs, diagnostics }
    }

    fn analyze<C: Cpu + ?Sized>(
        &self,
        cpu: &C,
        pc: u32,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> PrologueInfo {
        let info = analyze_fn(cpu, pc, &self.limits);

        if info.stop == ScanStop::BudgetExhausted {
            diagnostics.push(Diagnostic::ScanLimitExceeded {
                start_pc: pc,
                budget: self.limits.scan_budget,
            });
        }
        if info.is_incomplete() {
            let diag = Diagnostic::IncompletePrologue {
                pc,
                ra_save_offset: info.ra_save_offset,
                frame_size: info.frame_size,
            };
            warn!("{diag}");
            diagnostics.push(diag);
        }

        info
    }
}

/// [`Walker::walk`] with the default [`Limits`].
pub fn get_stack_pcs<C: Cpu + ?Sized>(cpu: &C) -> Backtrace {
    Walker::default().walk(cpu)
}
