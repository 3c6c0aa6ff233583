use thiserror::Error;

/// Errors arising from container parsing, program decoding, and evaluation.
#[derive(Debug, Error)]
pub enum ShowError {
    #[error("bad magic (expected 5B B3, got {got0:02X} {got1:02X})")]
    BadMagic { got0: u8, got1: u8 },

    #[error("unsupported format version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("checksum mismatch (expected 0x{expected:08X}, computed 0x{computed:08X})")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("truncated input for {what}: need {need} bytes at offset {offset}, have {have}")]
    Truncated {
        what: &'static str,
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("unknown light opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("zero-duration segment at offset {offset}")]
    ZeroDuration { offset: usize },

    #[error("coordinate scale {scale} outside 1..=127")]
    BadScale { scale: u8 },

    #[error("reserved axis format in segment header 0x{header:02X} at offset {offset}")]
    ReservedAxisFormat { header: u8, offset: usize },

    #[error("coordinate {value} mm does not fit a 16-bit field at any scale up to 127")]
    CoordinateOverflow { value: i32 },

    #[error("buffer capacity overflow (cannot grow to {requested} bytes)")]
    CapacityOverflow { requested: usize },

    #[error("operation not permitted on a buffer view")]
    ViewImmutable,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("no block of type {type_id} in container")]
    BlockNotFound { type_id: u8 },

    #[error("end of block stream")]
    EndOfStream,

    #[error("root finding unsupported for degree {degree}")]
    UnsupportedDegree { degree: usize },

    #[error("loop nesting deeper than {max} at offset {offset}")]
    LoopTooDeep { max: usize, offset: usize },

    #[error("loop end without matching loop begin at offset {offset}")]
    UnbalancedLoopEnd { offset: usize },

    #[error("light program makes no time progress near offset {offset}")]
    NoTimeProgress { offset: usize },

    #[error("jump target {target} outside program of {len} bytes")]
    JumpOutOfRange { target: isize, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ShowError {
    /// Create a `Truncated` error for a named structure.
    pub(crate) fn truncated(what: &'static str, offset: usize, need: usize, have: usize) -> Self {
        Self::Truncated {
            what,
            offset,
            need,
            have,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShowError>;
