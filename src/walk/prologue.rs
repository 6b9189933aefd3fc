//! Finds out how a function set up its stack frame by scanning backwards from an address inside
//! of it.
//!
//! Compiled code for this target doesn't come with any unwind tables, but the prologue
//! always has the same shape:
//!
//! ```text
//! addiu sp, sp, -FRAME    ; allocate the frame
//! sw    ra, SLOT(sp)      ; spill the return address (non-leaf functions only)
//! ```
//!
//! so we walk backwards until we have seen both, or until we run into the `jr ra` that ends the
//! function before this one.

#[cfg(test)]
mod tests;

use crate::arch::Marker;
use crate::config::Limits;
use crate::host::Memory;

/// Why a prologue scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStop {
    /// Both prologue instructions were found.
    Complete,
    /// Ran into a `jr ra`, so we left the function.
    Return,
    /// Reached the bottom of the address space.
    NullAddress,
    /// Scanned the whole budget.
    BudgetExhausted,
}

/// What we learned about one function's prologue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrologueInfo {
    /// Offset from the stack pointer of the slot the return address was spilled to.
    pub ra_save_offset: Option<u16>,
    /// The raw `addiu sp, sp, imm` immediate. Negative for a real prologue, so the caller's
    /// stack pointer is `sp - frame_size`.
    pub frame_size: Option<i16>,
    pub stop: ScanStop,
}

impl PrologueInfo {
    /// Both halves of the prologue, if we have them.
    pub fn frame(&self) -> Option<(u16, i16)> {
        Some((self.ra_save_offset?, self.frame_size?))
    }

    /// Exactly one of the two prologue instructions was found.
    pub fn is_incomplete(&self) -> bool {
        self.ra_save_offset.is_some() != self.frame_size.is_some()
    }
}

/// Scans backwards from `start_pc` for the prologue of the surrounding function.
///
/// Reads at most `limits.scan_instructions()` words, each address at most once, and never
/// writes anything.
#[instrument(level = "trace", skip(mem, limits))]
pub fn analyze_fn<M: Memory + ?Sized>(mem: &M, start_pc: u32, limits: &Limits) -> PrologueInfo {
    let mut ra_save_offset = None;
    let mut frame_size = None;
    let mut pc = start_pc;

    let stop = loop {
        match Marker::classify(mem.read_u32(pc)) {
            Some(Marker::SaveRa { offset }) => {
                if ra_save_offset.is_none() {
                    trace!("sw ra, {offset:#x}(sp) at {pc:#010x}");
                    ra_save_offset = Some(offset);
                }
            }
            Some(Marker::AdjustSp { imm }) => {
                if frame_size.is_none() {
                    trace!("addiu sp, sp, {imm} at {pc:#010x}");
                    frame_size = Some(imm);
                }
            }
            Some(Marker::Return) => {
                trace!("jr ra at {pc:#010x}");
                break ScanStop::Return;
            }
            None => {}
        }

        if ra_save_offset.is_some() && frame_size.is_some() {
            break ScanStop::Complete;
        }
        // The next step would wrap around, which also catches unaligned starts.
        if pc < 4 {
            break ScanStop::NullAddress;
        }

        let scanned = start_pc.wrapping_sub(pc).wrapping_add(4);
        if scanned >= limits.scan_budget {
            warn!("failed to find function prologue starting at {start_pc:#010X}");
            break ScanStop::BudgetExhausted;
        }

        pc = pc.wrapping_sub(4);
    };

    PrologueInfo {
        ra_save_offset,
        frame_size,
        stop,
    }
}
