//! Frame encoding.

use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::frame::{HEADER_LEN, TimeVal};

/// Writes timestamped frames to an underlying sink.
///
/// The encoder implements [`Write`]; every call to [`Write::write`] produces
/// exactly one frame stamped with the current wall-clock time. Writes are
/// never coalesced or split, which preserves the original chunk boundaries
/// for replay fidelity.
#[derive(Debug)]
pub struct Encoder<W> {
    writer: W,
    frames: u64,
}

impl<W: Write> Encoder<W> {
    /// Create an encoder writing frames to `writer`.
    pub const fn new(writer: W) -> Self {
        Self { writer, frames: 0 }
    }

    /// Write one frame containing `data`, stamped with the current time.
    ///
    /// Returns the number of payload bytes written (header bytes are not
    /// counted). A partial header or payload write surfaces as an error.
    pub fn write_frame(&mut self, data: &[u8]) -> io::Result<usize> {
        let len = u32::try_from(data.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "frame payload exceeds u32")
        })?;
        let time = now();

        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&time.seconds.to_le_bytes());
        header[4..8].copy_from_slice(&time.micro_seconds.to_le_bytes());
        header[8..12].copy_from_slice(&len.to_le_bytes());

        self.writer.write_all(&header)?;
        self.writer.write_all(data)?;
        self.frames += 1;
        Ok(data.len())
    }

    /// Number of frames written so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Get a reference to the underlying writer.
    pub const fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consume the encoder, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_frame(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Current wall-clock time as a [`TimeVal`].
///
/// A clock before the Unix epoch stamps zero; deltas between frames from a
/// single writer remain meaningful either way.
fn now() -> TimeVal {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::{Decoder, Error};

    #[test]
    fn one_write_one_frame() {
        let mut encoder = Encoder::new(Vec::new());
        assert_eq!(encoder.write_frame(b"hello").unwrap(), 5);
        assert_eq!(encoder.write_frame(b"").unwrap(), 0);
        assert_eq!(encoder.frames(), 2);

        let buf = encoder.into_inner();
        assert_eq!(buf.len(), 2 * HEADER_LEN + 5);
    }

    #[test]
    fn header_is_little_endian() {
        let mut encoder = Encoder::new(Vec::new());
        encoder.write_frame(b"ab").unwrap();
        let buf = encoder.into_inner();
        assert_eq!(&buf[8..12], &2u32.to_le_bytes());
        assert_eq!(&buf[12..], b"ab");
    }

    #[test]
    fn empty_payload_round_trips() {
        let mut encoder = Encoder::new(Vec::new());
        encoder.write_frame(b"").unwrap();
        let buf = encoder.into_inner();

        let mut decoder = Decoder::new(buf.as_slice());
        let frame: Frame = decoder.decode_frame().unwrap();
        assert!(frame.data.is_empty());
        assert!(matches!(
            decoder.decode_frame().unwrap_err(),
            Error::EndOfStream
        ));
    }
}
