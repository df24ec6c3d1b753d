#![forbid(unsafe_code)]

use std::io::Write;

use crc::{Crc, Digest};

use crate::error::{Error, Result};
use crate::sliding_window::SlidingWindow;

////////////////////////////////////////////////////////////////////////////////

pub(crate) static CRC_CODER: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Output sink that remembers what it emitted: the last 32 KiB for
/// back-references, the total byte count and a running CRC-32.
pub struct TrackingWriter<T> {
    inner: T,
    history: SlidingWindow,
    crc_digest: Digest<'static, u32>,
    num_bytes: usize,
}

impl<T: Write> TrackingWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            history: SlidingWindow::new(),
            crc_digest: CRC_CODER.digest(),
            num_bytes: 0,
        }
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_bytes(&[byte])
    }

    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;

        self.crc_digest.update(buf);
        self.history.extend(buf);
        self.num_bytes += buf.len();

        Ok(())
    }

    /// Copies `len` bytes starting `dist` bytes back, one byte at a time so
    /// that a copy may read bytes it has itself just produced.
    pub fn write_previous(&mut self, dist: usize, len: usize) -> Result<()> {
        if dist == 0 || dist > self.num_bytes {
            return Err(Error::InvalidDistance {
                distance: dist,
                available: self.num_bytes,
            });
        }

        for _ in 0..len {
            let byte = self
                .history
                .read_back(dist)
                .ok_or(Error::InvalidDistance {
                    distance: dist,
                    available: self.history.len(),
                })?;
            self.write_byte(byte)?;
        }

        Ok(())
    }

    pub fn byte_count(&self) -> usize {
        self.num_bytes
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Finishes the running checksum and hands back the sink.
    pub fn finish(self) -> (T, u32) {
        (self.inner, self.crc_digest.finalize())
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write() -> Result<()> {
        let mut writer = TrackingWriter::new(Vec::new());

        writer.write_bytes(&[1, 2, 3, 4])?;
        assert_eq!(writer.byte_count(), 4);

        writer.write_bytes(&[4, 8, 15, 16, 23])?;
        assert_eq!(writer.byte_count(), 9);

        writer.write_byte(0)?;
        assert_eq!(writer.byte_count(), 10);

        let (out, crc32) = writer.finish();
        assert_eq!(out, [1, 2, 3, 4, 4, 8, 15, 16, 23, 0]);
        assert_eq!(crc32, 2992191065);

        Ok(())
    }

    #[test]
    fn write_previous() -> Result<()> {
        let mut writer = TrackingWriter::new(Vec::new());

        for i in 0..=255 {
            writer.write_byte(i)?;
        }

        writer.write_previous(192, 128)?;
        assert_eq!(writer.byte_count(), 384);

        assert!(matches!(
            writer.write_previous(10000, 20),
            Err(Error::InvalidDistance {
                distance: 10000,
                available: 384
            })
        ));
        assert_eq!(writer.byte_count(), 384);

        assert!(writer.write_previous(0, 1).is_err());

        let (out, _) = writer.finish();
        assert_eq!(&out[256..384], &out[64..192]);

        Ok(())
    }

    #[test]
    fn overlapping_copy() -> Result<()> {
        let mut writer = TrackingWriter::new(Vec::new());

        writer.write_byte(b'A')?;
        writer.write_previous(1, 10)?;

        writer.write_bytes(b"xy")?;
        writer.write_previous(2, 5)?;

        let (out, _) = writer.finish();
        assert_eq!(out, b"AAAAAAAAAAAxyxyxyx");

        Ok(())
    }
}
