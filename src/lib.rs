#![forbid(unsafe_code)]

//! Decoder for gzip members (RFC 1952) and the DEFLATE streams inside them
//! (RFC 1951).
//!
//! ```no_run
//! let compressed = std::fs::read("notes.txt.gz")?;
//! let text = gzdecode::decompress(&compressed)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::Write;

mod bit_reader;
mod deflate;
mod error;
mod gzip;
mod huffman_coding;
mod sliding_window;
mod tracking_writer;

#[cfg(test)]
mod test_utils;

pub use bit_reader::BitCursor;
pub use deflate::inflate;
pub use error::{Error, Result};
pub use gzip::{
    read_header, CompressionMethod, DecompressOptions, Decompressor, MemberFlags, MemberFooter,
    MemberHeader, MemberInfo,
};
pub use huffman_coding::{canonical_codes, CanonicalHuffmanTree, CodeAssignment};
pub use sliding_window::{SlidingWindow, HISTORY_SIZE};

/// Decodes one gzip member into a freshly allocated buffer.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    Decompressor::new(input).decode_into(&mut output)?;
    Ok(output)
}

/// Decodes one gzip member, streaming the bytes into `output` as they are produced.
pub fn decompress_to<W: Write>(
    input: &[u8],
    output: W,
    options: DecompressOptions,
) -> Result<MemberInfo> {
    Decompressor::with_options(input, options).decode_into(output)
}
