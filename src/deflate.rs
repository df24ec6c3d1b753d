#![forbid(unsafe_code)]

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace};

use crate::bit_reader::BitCursor;
use crate::error::{Error, Result};
use crate::huffman_coding::{
    decode_litlen_distance_trees, fixed_trees, DistanceToken, HuffmanCoding, LitLenToken,
};
use crate::tracking_writer::TrackingWriter;

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub is_final: bool,
    pub compression_type: CompressionType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionType {
    Uncompressed = 0,
    FixedTree = 1,
    DynamicTree = 2,
}

////////////////////////////////////////////////////////////////////////////////

/// Decodes DEFLATE blocks one at a time until the final block is seen.
pub struct DeflateReader<'a> {
    bit_reader: BitCursor<'a>,
    done: bool,
}

impl<'a> DeflateReader<'a> {
    pub fn new(bit_reader: BitCursor<'a>) -> Self {
        Self {
            bit_reader,
            done: false,
        }
    }

    /// Hands back the cursor, positioned right after the last decoded bit.
    pub fn into_inner(self) -> BitCursor<'a> {
        self.bit_reader
    }

    fn read_header(&mut self) -> Result<BlockHeader> {
        let bit_offset = self.bit_reader.bit_offset();
        let is_final = self.bit_reader.next_bit()? != 0;
        let compression_type = match self.bit_reader.next_bits(2)? {
            0 => CompressionType::Uncompressed,
            1 => CompressionType::FixedTree,
            2 => CompressionType::DynamicTree,
            block_type => {
                return Err(Error::CorruptBlock {
                    block_type: block_type as u8,
                    bit_offset,
                })
            }
        };

        Ok(BlockHeader {
            is_final,
            compression_type,
        })
    }

    pub fn decode_all<W: Write>(&mut self, output: &mut TrackingWriter<W>) -> Result<()> {
        while !self.done {
            self.decode_block(output)?;
        }

        Ok(())
    }

    pub fn decode_block<W: Write>(
        &mut self,
        output: &mut TrackingWriter<W>,
    ) -> Result<BlockHeader> {
        let block_header = self.read_header()?;
        debug!(
            is_final = block_header.is_final,
            kind = ?block_header.compression_type,
            bit_offset = self.bit_reader.bit_offset(),
            "deflate block"
        );

        match block_header.compression_type {
            CompressionType::Uncompressed => self.decode_stored(output)?,

            CompressionType::FixedTree => {
                let trees = fixed_trees();
                self.decode_compressed(&trees.litlen, &trees.dist, output)?;
            }

            CompressionType::DynamicTree => {
                let (litlen_code, dist_code) =
                    decode_litlen_distance_trees(&mut self.bit_reader)?;
                self.decode_compressed(&litlen_code, &dist_code, output)?;
            }
        }

        self.done = block_header.is_final;
        Ok(block_header)
    }

    fn decode_stored<W: Write>(&mut self, output: &mut TrackingWriter<W>) -> Result<()> {
        self.bit_reader.align_to_byte();

        let len = LittleEndian::read_u16(&self.bit_reader.next_bytes(2)?);
        let nlen = LittleEndian::read_u16(&self.bit_reader.next_bytes(2)?);

        if len != !nlen {
            return Err(Error::LengthCheckFailed { len, nlen });
        }

        let data = self.bit_reader.next_bytes(len.into())?;
        output.write_bytes(&data)
    }

    fn decode_compressed<W: Write>(
        &mut self,
        litlen_code: &HuffmanCoding<LitLenToken>,
        dist_code: &HuffmanCoding<DistanceToken>,
        output: &mut TrackingWriter<W>,
    ) -> Result<()> {
        loop {
            match litlen_code.read_symbol(&mut self.bit_reader)? {
                LitLenToken::EndOfBlock => return Ok(()),

                LitLenToken::Literal(c) => output.write_byte(c)?,

                LitLenToken::Length { base, extra_bits } => {
                    let len = base as usize + self.bit_reader.next_bits(extra_bits)? as usize;

                    let DistanceToken { base, extra_bits } =
                        dist_code.read_symbol(&mut self.bit_reader)?;
                    let dist = base as usize + self.bit_reader.next_bits(extra_bits)? as usize;

                    trace!(len, dist, "back-reference");
                    output.write_previous(dist, len)?;
                }
            }
        }
    }
}

/// Decodes a raw DEFLATE stream (no gzip framing) into `output`.
pub fn inflate<W: Write>(input: &[u8], output: W) -> Result<u64> {
    let mut writer = TrackingWriter::new(output);
    let mut deflate_reader = DeflateReader::new(BitCursor::new(input));

    deflate_reader.decode_all(&mut writer)?;
    writer.flush()?;

    Ok(writer.byte_count() as u64)
}

////////////////////////////////////////////////////////////////////////////////
