//! Tuning knobs for the unwinder.

/// How much work a single backtrace request may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limits {
    /// How many bytes the prologue analyzer may scan backwards from its start address before it
    /// gives up on a frame. Must be a non-zero multiple of the instruction size.
    pub scan_budget: u32,
    /// Maximum number of entries in a backtrace, including the current PC.
    pub frame_cap: usize,
}

impl Limits {
    /// 16 KiB (4096 instructions) of scanning per frame and at most 512 frames.
    pub const DEFAULT: Self = Self {
        scan_budget: 16384,
        frame_cap: 512,
    };

    pub const fn new(scan_budget: u32, frame_cap: usize) -> Result<Self, LimitsError> {
        if scan_budget == 0 {
            return Err(LimitsError::EmptyScanBudget);
        }
        if scan_budget % 4 != 0 {
            return Err(LimitsError::UnalignedScanBudget(scan_budget));
        }
        if frame_cap == 0 {
            return Err(LimitsError::EmptyFrameCap);
        }

        Ok(Self {
            scan_budget,
            frame_cap,
        })
    }

    /// Number of instruction words the analyzer reads at most for one frame.
    #[inline]
    pub const fn scan_instructions(&self) -> u32 {
        self.scan_budget / 4
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LimitsError {
    #[error("scan budget must not be zero")]
    EmptyScanBudget,
    #[error("scan budget {0} is not a multiple of 4 bytes")]
    UnalignedScanBudget(u32),
    #[error("frame cap must not be zero")]
    EmptyFrameCap,
}
