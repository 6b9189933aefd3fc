//! Hand assembled memory images for the unwinder tests.

use core::cell::Cell;

use crate::arch::{addiu_sp_sp, sw_ra_sp, Reg, JR_RA};
use crate::host::{Cpu, Memory, Rdram, Snapshot};

pub(crate) const RDRAM_SIZE: usize = 0x4000;
pub(crate) const STACK_TOP: u32 = 0x8000_3f00;

/// Offset from a function's entry to the first instruction after its prologue.
pub(crate) const BODY: u32 = 0x10;

pub(crate) fn rdram() -> Rdram {
    Rdram::zeroed(RDRAM_SIZE)
}

/// Writes a function prologue at `entry`, preceded by the `jr ra` + delay slot of the function
/// before it:
///
/// ```text
/// entry-8: jr    ra
/// entry-4: nop
/// entry:   addiu sp, sp, frame
/// entry+4: sw    ra, slot(sp)   ; or nop
/// ```
pub(crate) fn function(rdram: &mut Rdram, entry: u32, frame: i16, ra_slot: Option<u16>) {
    let save = ra_slot.map(sw_ra_sp).unwrap_or(0);
    assert!(rdram.write_words(entry - 8, &[JR_RA, 0, addiu_sp_sp(frame), save]));
}

pub(crate) fn snapshot(rdram: Rdram, pc: u32, ra: u32, sp: u32) -> Snapshot {
    let mut snapshot = Snapshot::new(pc, [0; Reg::COUNT], rdram);
    snapshot.set_reg(Reg::RA, ra);
    snapshot.set_reg(Reg::SP, sp);
    snapshot
}

/// Counts every memory read.
pub(crate) struct Counting<C> {
    pub(crate) inner: C,
    pub(crate) reads: Cell<u64>,
}

impl<C> Counting<C> {
    pub(crate) fn new(inner: C) -> Self {
        Self {
            inner,
            reads: Cell::new(0),
        }
    }
}

impl<C: Memory> Memory for Counting<C> {
    fn read_u32(&self, addr: u32) -> u32 {
        self.reads.set(self.reads.get() + 1);
        self.inner.read_u32(addr)
    }
}

impl<C: Cpu> Cpu for Counting<C> {
    fn pc(&self) -> u32 {
        self.inner.pc()
    }

    fn reg(&self, reg: Reg) -> u32 {
        self.inner.reg(reg)
    }
}

/// Memory that reads the same word everywhere.
pub(crate) struct Filler {
    pub(crate) word: u32,
    pub(crate) pc: u32,
    pub(crate) ra: u32,
    pub(crate) sp: u32,
}

impl Memory for Filler {
    fn read_u32(&self, _addr: u32) -> u32 {
        self.word
    }
}

impl Cpu for Filler {
    fn pc(&self) -> u32 {
        self.pc
    }

    fn reg(&self, reg: Reg) -> u32 {
        match reg {
            Reg::RA => self.ra,
            Reg::SP => self.sp,
            _ => 0,
        }
    }
}
