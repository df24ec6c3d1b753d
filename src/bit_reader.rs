#![forbid(unsafe_code)]

use std::borrow::Cow;

use crate::error::{Error, Result};

////////////////////////////////////////////////////////////////////////////////

/// LSB-first bit reader over an in-memory byte slice.
///
/// The position only moves forward. Reading past the end is an
/// `UnexpectedEndOfStream` error carrying the bit offset of the failed read.
#[derive(Clone, Debug)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    bit_offset: usize,
}

impl<'a> BitCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_offset: 0,
        }
    }

    pub fn bit_offset(&self) -> usize {
        self.bit_offset
    }

    /// Index of the byte holding the next unread bit.
    pub fn byte_offset(&self) -> usize {
        self.bit_offset / 8
    }

    pub fn is_aligned(&self) -> bool {
        self.bit_offset % 8 == 0
    }

    pub fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.bit_offset
    }

    pub fn at_end(&self) -> bool {
        self.remaining_bits() == 0
    }

    /// Bytes before `byte_offset()`, i.e. everything fully consumed.
    pub fn consumed(&self) -> &'a [u8] {
        &self.data[..self.byte_offset()]
    }

    fn end_of_stream(&self) -> Error {
        Error::UnexpectedEndOfStream {
            bit_offset: self.bit_offset,
        }
    }

    pub fn next_bit(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.bit_offset / 8)
            .ok_or_else(|| self.end_of_stream())?;

        let bit = (byte >> (self.bit_offset % 8)) & 1;
        self.bit_offset += 1;

        Ok(bit)
    }

    /// Reads `len` bits; the first bit read lands in bit 0 of the result.
    ///
    /// # Panics
    ///
    /// Panics if `len` is greater than 32.
    pub fn next_bits(&mut self, len: u8) -> Result<u32> {
        assert!(len <= 32);

        if (len as usize) > self.remaining_bits() {
            return Err(self.end_of_stream());
        }

        let mut bits = 0_u32;
        for i in 0..len {
            bits |= u32::from(self.next_bit()?) << i;
        }

        Ok(bits)
    }

    /// Discards the rest of the current byte, if a byte has been partially read.
    pub fn align_to_byte(&mut self) {
        let rem = self.bit_offset % 8;
        if rem != 0 {
            self.bit_offset += 8 - rem;
        }
    }

    pub fn next_byte(&mut self) -> Result<u8> {
        Ok(self.next_bits(8)? as u8)
    }

    /// Reads `len` bytes. Borrows straight from the input when aligned.
    pub fn next_bytes(&mut self, len: usize) -> Result<Cow<'a, [u8]>> {
        if len * 8 > self.remaining_bits() {
            return Err(self.end_of_stream());
        }

        if self.is_aligned() {
            let start = self.byte_offset();
            self.bit_offset += len * 8;
            return Ok(Cow::Borrowed(&self.data[start..start + len]));
        }

        let mut bytes = Vec::with_capacity(len);
        for _ in 0..len {
            bytes.push(self.next_byte()?);
        }

        Ok(Cow::Owned(bytes))
    }

    /// Reads bytes up to (not including) the next zero byte, consuming the zero.
    pub fn next_cstring(&mut self) -> Result<Cow<'a, [u8]>> {
        if self.is_aligned() {
            let start = self.byte_offset();
            let len = self.data[start..]
                .iter()
                .position(|&b| b == 0)
                .ok_or(Error::UnexpectedEndOfStream {
                    bit_offset: self.data.len() * 8,
                })?;
            self.bit_offset += (len + 1) * 8;
            return Ok(Cow::Borrowed(&self.data[start..start + len]));
        }

        let mut bytes = Vec::new();
        loop {
            match self.next_byte()? {
                0 => break,
                b => bytes.push(b),
            }
        }

        Ok(Cow::Owned(bytes))
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_bits() -> Result<()> {
        let data: &[u8] = &[0b01100011, 0b11011011, 0b10101111];
        let mut reader = BitCursor::new(data);
        assert_eq!(reader.next_bits(1)?, 0b1);
        assert_eq!(reader.next_bits(2)?, 0b01);
        assert_eq!(reader.next_bits(3)?, 0b100);
        assert_eq!(reader.next_bits(4)?, 0b1101);
        assert_eq!(reader.next_bits(5)?, 0b10110);
        assert_eq!(reader.next_bits(8)?, 0b01011111);
        assert_eq!(reader.remaining_bits(), 1);
        assert!(matches!(
            reader.next_bits(2),
            Err(Error::UnexpectedEndOfStream { bit_offset: 23 })
        ));
        // A failed read does not move the cursor.
        assert_eq!(reader.next_bit()?, 1);
        assert!(reader.at_end());
        Ok(())
    }

    #[test]
    #[should_panic]
    fn next_bits_wider_than_u32() {
        let mut reader = BitCursor::new(&[0xFF; 8]);
        let _ = reader.next_bits(33);
    }

    #[test]
    fn next_byte_unaligned() -> Result<()> {
        let mut reader = BitCursor::new(&[0xAB]);
        assert_eq!(reader.next_byte()?, 0xAB);

        let mut reader = BitCursor::new(&[0b1000_0001, 0b0000_0001]);
        assert_eq!(reader.next_bit()?, 1);
        assert_eq!(reader.next_byte()?, 0b1100_0000);
        assert_eq!(reader.bit_offset(), 9);
        Ok(())
    }

    #[test]
    fn align_to_byte() -> Result<()> {
        let data: &[u8] = &[0b01100011, 0b11011011, 0b10101111];
        let mut reader = BitCursor::new(data);

        reader.align_to_byte();
        assert_eq!(reader.bit_offset(), 0);

        assert_eq!(reader.next_bits(3)?, 0b011);
        reader.align_to_byte();
        assert_eq!(reader.byte_offset(), 1);
        assert_eq!(reader.next_bytes(1)?.as_ref(), &[0b11011011]);
        assert!(matches!(reader.next_bytes(1)?, Cow::Borrowed(_)));
        assert!(reader.next_bytes(1).is_err());
        Ok(())
    }

    #[test]
    fn next_bytes_past_end_is_error() {
        let mut reader = BitCursor::new(&[1, 2, 3]);
        assert!(matches!(
            reader.next_bytes(4),
            Err(Error::UnexpectedEndOfStream { bit_offset: 0 })
        ));
        assert_eq!(reader.remaining_bits(), 24);
    }

    #[test]
    fn next_cstring() -> Result<()> {
        let mut reader = BitCursor::new(b"a.txt\0rest\0");
        assert_eq!(reader.next_cstring()?.as_ref(), b"a.txt");
        assert_eq!(reader.next_cstring()?.as_ref(), b"rest");
        assert!(reader.at_end());

        let mut reader = BitCursor::new(b"unterminated");
        assert!(reader.next_cstring().is_err());
        Ok(())
    }
}
