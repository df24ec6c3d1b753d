#![forbid(unsafe_code)]

//! Error taxonomy for gzip/DEFLATE decoding.
//!
//! Every failure is terminal for the member being decoded. Bytes already
//! handed to a sink are not retracted, so streaming callers must treat an
//! error as truncation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad magic, unsupported method, reserved flag bits or unexpected XFL.
    #[error("corrupt gzip header: {reason}")]
    CorruptHeader { reason: String },

    /// Reserved block type `11`.
    #[error("corrupt block: reserved block type {block_type:#04b} at bit {bit_offset}")]
    CorruptBlock { block_type: u8, bit_offset: usize },

    /// Stored block whose NLEN is not the one's complement of LEN.
    #[error("stored block length check failed: LEN={len:#06x}, NLEN={nlen:#06x}")]
    LengthCheckFailed { len: u16, nlen: u16 },

    /// A code path runs through an existing leaf, or the code does not fit its length.
    #[error("invalid Huffman tree shape while inserting symbol {symbol}")]
    InvalidTreeShape { symbol: u16 },

    #[error("duplicate Huffman code for symbol {symbol}")]
    DuplicateCode { symbol: u16 },

    /// Traversal fell off a missing child.
    #[error("incomplete Huffman tree: no code matches input at bit {bit_offset}")]
    IncompleteTree { bit_offset: usize },

    #[error("invalid code length run at entry {position}: {reason}")]
    InvalidRunLength {
        reason: &'static str,
        position: usize,
    },

    #[error("corrupt literal/length code {symbol}")]
    CorruptLengthCode { symbol: u16 },

    #[error("invalid distance code {symbol}")]
    InvalidDistanceCode { symbol: u16 },

    #[error("invalid distance {distance}: only {available} bytes decoded so far")]
    InvalidDistance { distance: usize, available: usize },

    #[error("unexpected end of stream at bit {bit_offset}")]
    UnexpectedEndOfStream { bit_offset: usize },

    #[error("{what} checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        what: &'static str,
        expected: u32,
        actual: u32,
    },

    /// ISIZE trailer does not match the decoded length modulo 2^32.
    #[error("size mismatch: trailer says {expected} bytes, decoded {actual}")]
    SizeMismatch { expected: u32, actual: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt_header(reason: impl Into<String>) -> Self {
        Error::CorruptHeader {
            reason: reason.into(),
        }
    }

    /// Stable category name, one per failure class.
    pub fn category(&self) -> &'static str {
        match self {
            Error::CorruptHeader { .. } => "corrupt_header",
            Error::CorruptBlock { .. } => "corrupt_block",
            Error::LengthCheckFailed { .. } => "length_check_failed",
            Error::InvalidTreeShape { .. } => "invalid_tree_shape",
            Error::DuplicateCode { .. } => "duplicate_code",
            Error::IncompleteTree { .. } => "incomplete_tree",
            Error::InvalidRunLength { .. } => "invalid_run_length",
            Error::CorruptLengthCode { .. } => "corrupt_length_code",
            Error::InvalidDistanceCode { .. } | Error::InvalidDistance { .. } => {
                "invalid_distance"
            }
            Error::UnexpectedEndOfStream { .. } => "unexpected_end_of_stream",
            Error::ChecksumMismatch { .. } => "checksum_mismatch",
            Error::SizeMismatch { .. } => "size_mismatch",
            Error::Io(_) => "io_error",
        }
    }
}
