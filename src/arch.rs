//! MIPS (VR4300) register numbering and the handful of instruction encodings the
//! prologue analyzer looks for.
//!
//! All encodings are built from their fields instead of being written out as hex so that they
//! can be checked against the ISA manual:
//!
//! ```text
//! I-type:  | opcode:6 | rs:5 | rt:5 | immediate:16 |
//! R-type:  | SPECIAL:6 | rs:5 | rt:5 | rd:5 | shamt:5 | funct:6 |
//! ```

/// A general purpose register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(pub u8);

impl Reg {
    pub const ZERO: Reg = Reg(0);
    pub const AT: Reg = Reg(1);
    pub const V0: Reg = Reg(2);
    pub const V1: Reg = Reg(3);
    pub const A0: Reg = Reg(4);
    pub const A1: Reg = Reg(5);
    pub const A2: Reg = Reg(6);
    pub const A3: Reg = Reg(7);
    pub const T0: Reg = Reg(8);
    pub const T1: Reg = Reg(9);
    pub const T2: Reg = Reg(10);
    pub const T3: Reg = Reg(11);
    pub const T4: Reg = Reg(12);
    pub const T5: Reg = Reg(13);
    pub const T6: Reg = Reg(14);
    pub const T7: Reg = Reg(15);
    pub const S0: Reg = Reg(16);
    pub const S1: Reg = Reg(17);
    pub const S2: Reg = Reg(18);
    pub const S3: Reg = Reg(19);
    pub const S4: Reg = Reg(20);
    pub const S5: Reg = Reg(21);
    pub const S6: Reg = Reg(22);
    pub const S7: Reg = Reg(23);
    pub const T8: Reg = Reg(24);
    pub const T9: Reg = Reg(25);
    pub const K0: Reg = Reg(26);
    pub const K1: Reg = Reg(27);
    pub const GP: Reg = Reg(28);
    /// Stack pointer.
    pub const SP: Reg = Reg(29);
    /// Frame pointer, also known as `s8`.
    pub const FP: Reg = Reg(30);
    /// Return address, written by `jal`/`jalr`.
    pub const RA: Reg = Reg(31);

    pub const COUNT: usize = 32;

    pub fn index(self) -> usize {
        usize::from(self.0 & 0x1f)
    }
}

const OP_SPECIAL: u32 = 0x00;
const OP_ADDIU: u32 = 0x09;
const OP_SW: u32 = 0x2b;
const FUNCT_JR: u32 = 0x08;

const fn i_type_upper(opcode: u32, rs: Reg, rt: Reg) -> u32 {
    (opcode << 26) | ((rs.0 as u32) << 21) | ((rt.0 as u32) << 16)
}

const fn r_type(rs: Reg, rt: Reg, rd: Reg, shamt: u32, funct: u32) -> u32 {
    (OP_SPECIAL << 26)
        | ((rs.0 as u32) << 21)
        | ((rt.0 as u32) << 16)
        | ((rd.0 as u32) << 11)
        | (shamt << 6)
        | funct
}

/// Selects the opcode, `rs` and `rt` fields of an I-type instruction.
pub const UPPER_MASK: u32 = 0xffff_0000;

/// `sw ra, imm(sp)`: spill of the return address. The immediate is the unsigned
/// byte offset of the slot from the stack pointer.
pub const SW_RA_SP: u32 = i_type_upper(OP_SW, Reg::SP, Reg::RA);

/// `addiu sp, sp, imm`: stack pointer adjustment. A prologue has a negative immediate.
pub const ADDIU_SP_SP: u32 = i_type_upper(OP_ADDIU, Reg::SP, Reg::SP);

/// `jr ra`: function return. Marks the end of the previous function when scanning backwards.
pub const JR_RA: u32 = r_type(Reg::RA, Reg::ZERO, Reg::ZERO, 0, FUNCT_JR);

/// A prologue instruction the analyzer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// `sw ra, offset(sp)`
    SaveRa { offset: u16 },
    /// `addiu sp, sp, imm`
    AdjustSp { imm: i16 },
    /// `jr ra`
    Return,
}

impl Marker {
    pub fn classify(word: u32) -> Option<Marker> {
        let imm = (word & 0xffff) as u16;
        match word & UPPER_MASK {
            SW_RA_SP => Some(Marker::SaveRa { offset: imm }),
            ADDIU_SP_SP => Some(Marker::AdjustSp { imm: imm as i16 }),
            _ if word == JR_RA => Some(Marker::Return),
            _ => None,
        }
    }
}

/// Assembles `sw ra, offset(sp)`.
pub const fn sw_ra_sp(offset: u16) -> u32 {
    SW_RA_SP | offset as u32
}

/// Assembles `addiu sp, sp, imm`.
pub const fn addiu_sp_sp(imm: i16) -> u32 {
    ADDIU_SP_SP | (imm as u16) as u32
}
