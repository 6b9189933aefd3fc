/// Something that went wrong while unwinding. None of these are fatal, the walker always returns
/// whatever it managed to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    /// The analyzer walked back `budget` bytes without finding both prologue instructions.
    #[error("failed to find function prologue starting at {start_pc:#010X} (scanned {budget} bytes)")]
    ScanLimitExceeded { start_pc: u32, budget: u32 },
    /// Exactly one of the two prologue instructions was found before the scan stopped.
    #[error(
        "incomplete prologue for {pc:#010X}: ra save offset {ra_save_offset:?}, frame size {frame_size:?}"
    )]
    IncompletePrologue {
        pc: u32,
        ra_save_offset: Option<u16>,
        frame_size: Option<i16>,
    },
    /// The backtrace reached the frame cap and was cut off.
    #[error("hit soft stack limit of {cap} frames")]
    FrameCapExceeded { cap: usize },
}
