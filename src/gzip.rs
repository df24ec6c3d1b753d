#![forbid(unsafe_code)]

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::{
    bit_reader::BitCursor,
    deflate::DeflateReader,
    error::{Error, Result},
    tracking_writer::{TrackingWriter, CRC_CODER},
};

////////////////////////////////////////////////////////////////////////////////

const ID1: u8 = 0x1f;
const ID2: u8 = 0x8b;

const CM_DEFLATE: u8 = 8;

const FTEXT_OFFSET: u8 = 0;
const FHCRC_OFFSET: u8 = 1;
const FEXTRA_OFFSET: u8 = 2;
const FNAME_OFFSET: u8 = 3;
const FCOMMENT_OFFSET: u8 = 4;

const RESERVED_FLAGS: u8 = 0b1110_0000;

const FOOTER_BITS: usize = 8 * 8;

////////////////////////////////////////////////////////////////////////////////

/// Knobs for how strictly a member is checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecompressOptions {
    /// Require the CRC-32/ISIZE trailer and check it, and check FHCRC if present.
    pub verify_checksums: bool,
    /// Reject any XFL byte other than 0x00.
    pub strict_extra_flags: bool,
}

impl Default for DecompressOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            strict_extra_flags: true,
        }
    }
}

impl DecompressOptions {
    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn with_strict_extra_flags(mut self, strict: bool) -> Self {
        self.strict_extra_flags = strict;
        self
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemberHeader {
    pub compression_method: CompressionMethod,
    pub modification_time: u32,
    pub extra: Option<Vec<u8>>,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub extra_flags: u8,
    pub os: u8,
    pub header_crc: Option<u16>,
    pub is_text: bool,
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    #[default]
    Deflate,
    Unknown(u8),
}

impl From<u8> for CompressionMethod {
    fn from(value: u8) -> Self {
        match value {
            CM_DEFLATE => Self::Deflate,
            x => Self::Unknown(x),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberFlags(pub u8);

impl MemberFlags {
    fn bit(&self, n: u8) -> bool {
        (self.0 >> n) & 1 != 0
    }

    pub fn is_text(&self) -> bool {
        self.bit(FTEXT_OFFSET)
    }

    pub fn has_crc(&self) -> bool {
        self.bit(FHCRC_OFFSET)
    }

    pub fn has_extra(&self) -> bool {
        self.bit(FEXTRA_OFFSET)
    }

    pub fn has_name(&self) -> bool {
        self.bit(FNAME_OFFSET)
    }

    pub fn has_comment(&self) -> bool {
        self.bit(FCOMMENT_OFFSET)
    }

    pub fn reserved(&self) -> u8 {
        self.0 & RESERVED_FLAGS
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberFooter {
    pub data_crc32: u32,
    pub data_size: u32,
}

/// What was learned while decoding one member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberInfo {
    pub header: MemberHeader,
    /// Trailer as found in the input, if one was present.
    pub footer: Option<MemberFooter>,
    /// CRC-32 of the decoded bytes.
    pub crc32: u32,
    pub size: u64,
}

////////////////////////////////////////////////////////////////////////////////

// FNAME and FCOMMENT are ISO 8859-1, which maps byte-for-byte onto chars.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Parses the fixed 10-byte header and the optional fields its flags announce.
pub fn read_header(
    reader: &mut BitCursor<'_>,
    options: &DecompressOptions,
) -> Result<MemberHeader> {
    let magic = reader.next_bytes(2)?;
    if magic[..] != [ID1, ID2] {
        return Err(Error::corrupt_header(format!(
            "magic {:#04x} {:#04x} is not 0x1f 0x8b",
            magic[0], magic[1]
        )));
    }

    let mut header = MemberHeader::default();

    let method = reader.next_byte()?;
    header.compression_method = CompressionMethod::from(method);
    if header.compression_method != CompressionMethod::Deflate {
        return Err(Error::corrupt_header(format!(
            "unsupported compression method {method}"
        )));
    }

    let flags = MemberFlags(reader.next_byte()?);
    if flags.reserved() != 0 {
        return Err(Error::corrupt_header(format!(
            "reserved flag bits set in {:#04x}",
            flags.0
        )));
    }

    header.modification_time = LittleEndian::read_u32(&reader.next_bytes(4)?);

    header.extra_flags = reader.next_byte()?;
    if options.strict_extra_flags && header.extra_flags != 0 {
        return Err(Error::corrupt_header(format!(
            "unexpected extra flags {:#04x}",
            header.extra_flags
        )));
    }

    header.os = reader.next_byte()?;
    header.is_text = flags.is_text();

    if flags.has_extra() {
        let xlen = LittleEndian::read_u16(&reader.next_bytes(2)?);
        header.extra = Some(reader.next_bytes(xlen.into())?.into_owned());
    }

    if flags.has_name() {
        header.name = Some(latin1(&reader.next_cstring()?));
    }

    if flags.has_comment() {
        header.comment = Some(latin1(&reader.next_cstring()?));
    }

    if flags.has_crc() {
        let covered = reader.consumed();
        let crc16 = LittleEndian::read_u16(&reader.next_bytes(2)?);
        header.header_crc = Some(crc16);

        if options.verify_checksums {
            let actual = CRC_CODER.checksum(covered) & 0xffff;
            if u32::from(crc16) != actual {
                return Err(Error::ChecksumMismatch {
                    what: "header CRC16",
                    expected: crc16.into(),
                    actual,
                });
            }
        }
    }

    debug!(
        name = ?header.name,
        mtime = header.modification_time,
        xfl = header.extra_flags,
        os = header.os,
        "gzip member header"
    );

    Ok(header)
}

/// Reads the CRC-32 and ISIZE trailer from the next byte boundary.
pub fn read_footer(reader: &mut BitCursor<'_>) -> Result<MemberFooter> {
    reader.align_to_byte();
    let bytes = reader.next_bytes(8)?;

    Ok(MemberFooter {
        data_crc32: LittleEndian::read_u32(&bytes[0..4]),
        data_size: LittleEndian::read_u32(&bytes[4..8]),
    })
}

////////////////////////////////////////////////////////////////////////////////

/// Decodes a single gzip member held in memory.
pub struct Decompressor<'a> {
    reader: BitCursor<'a>,
    options: DecompressOptions,
}

impl<'a> Decompressor<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self::with_options(input, DecompressOptions::default())
    }

    pub fn with_options(input: &'a [u8], options: DecompressOptions) -> Self {
        Self {
            reader: BitCursor::new(input),
            options,
        }
    }

    /// Decodes the whole member, streaming output bytes into `output`.
    pub fn decode_into<W: Write>(self, output: W) -> Result<MemberInfo> {
        let Self {
            mut reader,
            options,
        } = self;

        let header = read_header(&mut reader, &options)?;

        let mut writer = TrackingWriter::new(output);
        let mut deflate_reader = DeflateReader::new(reader);
        deflate_reader.decode_all(&mut writer)?;
        writer.flush()?;

        let size = writer.byte_count() as u64;
        let (_, crc32) = writer.finish();

        let mut reader = deflate_reader.into_inner();
        reader.align_to_byte();

        let footer = if options.verify_checksums || reader.remaining_bits() >= FOOTER_BITS {
            Some(read_footer(&mut reader)?)
        } else {
            None
        };

        if options.verify_checksums {
            if let Some(footer) = footer {
                if footer.data_crc32 != crc32 {
                    return Err(Error::ChecksumMismatch {
                        what: "CRC-32",
                        expected: footer.data_crc32,
                        actual: crc32,
                    });
                }

                if footer.data_size != size as u32 {
                    return Err(Error::SizeMismatch {
                        expected: footer.data_size,
                        actual: size as u32,
                    });
                }
            }
        }

        if !reader.at_end() {
            warn!(
                trailing_bytes = reader.remaining_bits() / 8,
                "ignoring data after the first gzip member"
            );
        }

        Ok(MemberInfo {
            header,
            footer,
            crc32,
            size,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn header_bytes(flags: u8, xfl: u8) -> Vec<u8> {
        let mut bytes = vec![ID1, ID2, CM_DEFLATE, flags];
        bytes.write_u32::<LittleEndian>(1_700_000_000).unwrap();
        bytes.push(xfl);
        bytes.push(3);
        bytes
    }

    fn parse(bytes: &[u8]) -> Result<MemberHeader> {
        read_header(&mut BitCursor::new(bytes), &DecompressOptions::default())
    }

    #[test]
    fn minimal_header() -> Result<()> {
        let header = parse(&header_bytes(0, 0))?;

        assert_eq!(header.compression_method, CompressionMethod::Deflate);
        assert_eq!(header.modification_time, 1_700_000_000);
        assert_eq!(header.os, 3);
        assert_eq!(header.name, None);
        assert!(!header.is_text);

        Ok(())
    }

    #[test]
    fn optional_fields() -> Result<()> {
        let flags = (1 << FTEXT_OFFSET)
            | (1 << FEXTRA_OFFSET)
            | (1 << FNAME_OFFSET)
            | (1 << FCOMMENT_OFFSET);
        let mut bytes = header_bytes(flags, 0);
        bytes.write_u16::<LittleEndian>(3).unwrap();
        bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        bytes.extend_from_slice(b"a.txt\0");
        bytes.extend_from_slice(b"caf\xe9\0");
        bytes.push(0xFF);

        let mut reader = BitCursor::new(&bytes);
        let header = read_header(&mut reader, &DecompressOptions::default())?;

        assert!(header.is_text);
        assert_eq!(header.extra.as_deref(), Some(&[0xAA, 0xBB, 0xCC][..]));
        assert_eq!(header.name.as_deref(), Some("a.txt"));
        assert_eq!(header.comment.as_deref(), Some("café"));
        assert_eq!(reader.next_byte()?, 0xFF);

        Ok(())
    }

    #[test]
    fn header_crc() -> Result<()> {
        let flags = (1 << FHCRC_OFFSET) | (1 << FNAME_OFFSET);
        let mut bytes = header_bytes(flags, 0);
        bytes.extend_from_slice(b"x\0");
        let crc16 = (CRC_CODER.checksum(&bytes) & 0xffff) as u16;
        bytes.write_u16::<LittleEndian>(crc16).unwrap();

        let strict = DecompressOptions::default().with_verify_checksums(true);
        let header = read_header(&mut BitCursor::new(&bytes), &strict)?;
        assert_eq!(header.header_crc, Some(crc16));

        let len = bytes.len();
        bytes[len - 1] ^= 0xFF;
        assert!(matches!(
            read_header(&mut BitCursor::new(&bytes), &strict),
            Err(Error::ChecksumMismatch { .. })
        ));
        // Not checked unless asked for.
        assert!(parse(&bytes).is_ok());

        Ok(())
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = header_bytes(0, 0);
        bytes[1] = 0x8c;
        assert!(matches!(parse(&bytes), Err(Error::CorruptHeader { .. })));
    }

    #[test]
    fn rejects_unknown_method() {
        let mut bytes = header_bytes(0, 0);
        bytes[2] = 7;
        let err = parse(&bytes).unwrap_err();
        assert_eq!(err.category(), "corrupt_header");
        assert!(err.to_string().contains("method 7"));
    }

    #[test]
    fn rejects_reserved_flags() {
        for bit in 5..8 {
            let bytes = header_bytes(1 << bit, 0);
            assert!(matches!(parse(&bytes), Err(Error::CorruptHeader { .. })));
        }
    }

    #[test]
    fn extra_flags_strictness() -> Result<()> {
        let bytes = header_bytes(0, 2);
        assert!(matches!(parse(&bytes), Err(Error::CorruptHeader { .. })));

        let lenient = DecompressOptions::default().with_strict_extra_flags(false);
        let header = read_header(&mut BitCursor::new(&bytes), &lenient)?;
        assert_eq!(header.extra_flags, 2);

        Ok(())
    }

    #[test]
    fn truncated_header() {
        let bytes = header_bytes(1 << FNAME_OFFSET, 0);
        assert!(matches!(
            parse(&bytes[..6]),
            Err(Error::UnexpectedEndOfStream { .. })
        ));
        // FNAME announced but never terminated.
        assert!(matches!(
            parse(&bytes),
            Err(Error::UnexpectedEndOfStream { .. })
        ));
    }

    #[test]
    fn footer() -> Result<()> {
        let mut bytes = vec![0b101];
        bytes.write_u32::<LittleEndian>(0xDEADBEEF).unwrap();
        bytes.write_u32::<LittleEndian>(42).unwrap();

        let mut reader = BitCursor::new(&bytes);
        reader.next_bits(3)?;
        let footer = read_footer(&mut reader)?;

        assert_eq!(
            footer,
            MemberFooter {
                data_crc32: 0xDEADBEEF,
                data_size: 42
            }
        );
        assert!(reader.at_end());

        Ok(())
    }
}
