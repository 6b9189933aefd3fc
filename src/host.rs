//! The view of the emulated machine the unwinder works with.
//!
//! The unwinder itself only needs [`Cpu`]. [`Snapshot`] is a copy of the interesting state
//! (registers plus an RDRAM dump) for running it outside of the emulator.

use alloc::vec::Vec;

use crate::arch::Reg;

/// Big-endian, word-granular memory access.
///
/// `read_u32` must be total: unmapped or garbage addresses return some fill value instead of
/// failing.
pub trait Memory {
    fn read_u32(&self, addr: u32) -> u32;

    /// The high half of the word at `addr`.
    fn read_u16(&self, addr: u32) -> u16 {
        (self.read_u32(addr) >> 16) as u16
    }

    /// The high byte of the word at `addr`.
    fn read_u8(&self, addr: u32) -> u8 {
        (self.read_u32(addr) >> 24) as u8
    }
}

/// A stopped CPU.
pub trait Cpu: Memory {
    fn pc(&self) -> u32;
    fn reg(&self, reg: Reg) -> u32;
}

impl<M: Memory + ?Sized> Memory for &M {
    fn read_u32(&self, addr: u32) -> u32 {
        (**self).read_u32(addr)
    }
}

impl<C: Cpu + ?Sized> Cpu for &C {
    fn pc(&self) -> u32 {
        (**self).pc()
    }

    fn reg(&self, reg: Reg) -> u32 {
        (**self).reg(reg)
    }
}

const SEGMENT_MASK: u32 = 0xc000_0000;
/// KSEG0 and KSEG1 are both directly mapped onto physical memory.
const DIRECT_MAPPED: u32 = 0x8000_0000;
const PHYSICAL_MASK: u32 = 0x1fff_fffc;

/// A dump of RDRAM, stored big-endian the way the console sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rdram {
    bytes: Vec<u8>,
}

impl Rdram {
    /// A zero-filled image of `len` bytes, rounded down to whole words.
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: alloc::vec![0; len & !3],
        }
    }

    /// Takes a raw dump. A trailing partial word is dropped.
    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        bytes.truncate(bytes.len() & !3);
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Physical offset of a virtual address, if it is directly mapped.
    fn translate(addr: u32) -> Option<usize> {
        if addr & SEGMENT_MASK != DIRECT_MAPPED {
            // Would need the TLB.
            return None;
        }
        Some((addr & PHYSICAL_MASK) as usize)
    }

    fn word_at(&self, offset: usize) -> Option<&[u8]> {
        self.bytes.get(offset..offset + 4)
    }

    fn read_aligned(&self, addr: u32) -> u32 {
        Self::translate(addr)
            .and_then(|offset| self.word_at(offset))
            .map(|word| u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
            .unwrap_or(0)
    }

    fn write_aligned(&mut self, addr: u32, value: u32, mask: u32) -> bool {
        let Some(offset) = Self::translate(addr) else {
            return false;
        };
        match self.bytes.get_mut(offset..offset + 4) {
            Some(word) => {
                let old = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
                let new = (old & !mask) | (value & mask);
                word.copy_from_slice(&new.to_be_bytes());
                true
            }
            None => false,
        }
    }

    /// Writes a word at a directly mapped address. Returns `false` if any part of it is not
    /// backed by the image.
    pub fn write_u32(&mut self, addr: u32, value: u32) -> bool {
        self.write_u32_masked(addr, value, !0)
    }

    /// Replaces only the bits of the word at `addr` that are set in `mask`. Unaligned
    /// addresses patch the two surrounding words.
    pub fn write_u32_masked(&mut self, addr: u32, value: u32, mask: u32) -> bool {
        let alignment = addr & 3;
        if alignment == 0 {
            return self.write_aligned(addr, value, mask);
        }

        let left = addr & !3;
        let shift = alignment * 8;
        let (left_mask, right_mask) = (mask >> shift, mask << (32 - shift));
        // A half with nothing to write doesn't need to be backed.
        let wrote_left = left_mask == 0 || self.write_aligned(left, value >> shift, left_mask);
        let wrote_right = right_mask == 0
            || self.write_aligned(left.wrapping_add(4), value << (32 - shift), right_mask);
        wrote_left && wrote_right
    }

    /// Writes the two bytes at `addr`, the counterpart of [`Memory::read_u16`].
    pub fn write_u16(&mut self, addr: u32, value: u16) -> bool {
        self.write_u32_masked(addr, u32::from(value) << 16, 0xffff_0000)
    }

    /// Writes the byte at `addr`, the counterpart of [`Memory::read_u8`].
    pub fn write_u8(&mut self, addr: u32, value: u8) -> bool {
        self.write_u32_masked(addr, u32::from(value) << 24, 0xff00_0000)
    }

    /// Writes consecutive words starting at `addr`.
    pub fn write_words(&mut self, addr: u32, words: &[u32]) -> bool {
        words
            .iter()
            .enumerate()
            .all(|(i, &word)| self.write_u32(addr.wrapping_add(4 * i as u32), word))
    }
}

impl Memory for Rdram {
    fn read_u32(&self, addr: u32) -> u32 {
        let alignment = addr & 3;
        if alignment == 0 {
            return self.read_aligned(addr);
        }

        let left = addr & !3;
        let shift = alignment * 8;
        let high = self.read_aligned(left) << shift;
        let low = self.read_aligned(left.wrapping_add(4)) >> (32 - shift);
        high | low
    }
}

/// Registers and memory captured at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub pc: u32,
    pub regs: [u32; Reg::COUNT],
    /// Multiply/divide result registers.
    pub hi: u64,
    pub lo: u64,
    pub rdram: Rdram,
}

impl Snapshot {
    pub fn new(pc: u32, regs: [u32; Reg::COUNT], rdram: Rdram) -> Self {
        Self {
            pc,
            regs,
            hi: 0,
            lo: 0,
            rdram,
        }
    }

    /// Builds a snapshot from the 64-bit GPRs the emulator keeps. Only the low word is used.
    pub fn from_gprs(pc: u32, gprs: &[u64; Reg::COUNT], rdram: Rdram) -> Self {
        Self::new(pc, gprs.map(|value| value as u32), rdram)
    }

    pub fn set_reg(&mut self, reg: Reg, value: u32) {
        self.regs[reg.index()] = value;
    }
}

impl Memory for Snapshot {
    fn read_u32(&self, addr: u32) -> u32 {
        self.rdram.read_u32(addr)
    }
}

impl Cpu for Snapshot {
    fn pc(&self) -> u32 {
        self.pc
    }

    fn reg(&self, reg: Reg) -> u32 {
        self.regs[reg.index()]
    }
}
