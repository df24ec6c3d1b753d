#![forbid(unsafe_code)]

//! Helpers for crafting DEFLATE bit streams by hand in unit tests.

/// LSB-first bit writer, the mirror image of `BitCursor`.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_bit(&mut self, bit: u32) {
        if self.bit_len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit & 1 != 0 {
            *self.bytes.last_mut().unwrap() |= 1 << (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    /// Writes a numeric field, low bit first.
    pub fn write_bits(&mut self, value: u32, len: u8) {
        for i in 0..len {
            self.push_bit(value >> i);
        }
    }

    /// Writes a Huffman code, most significant bit first.
    pub fn write_code(&mut self, code: u32, len: u8) {
        for i in (0..len).rev() {
            self.push_bit(code >> i);
        }
    }

    pub fn align(&mut self) {
        self.bit_len = self.bytes.len() * 8;
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.align();
        self.bytes.extend_from_slice(bytes);
        self.bit_len = self.bytes.len() * 8;
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_reader::BitCursor;
    use crate::error::Result;

    #[test]
    fn mirrors_bit_cursor() -> Result<()> {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_code(0b110, 3);
        writer.write_bytes(&[0xAB]);
        let data = writer.finish();

        let mut reader = BitCursor::new(&data);
        assert_eq!(reader.next_bits(3)?, 0b101);
        assert_eq!(reader.next_bit()?, 1);
        assert_eq!(reader.next_bit()?, 1);
        assert_eq!(reader.next_bit()?, 0);
        reader.align_to_byte();
        assert_eq!(reader.next_byte()?, 0xAB);
        Ok(())
    }
}
