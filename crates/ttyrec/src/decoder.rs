//! Frame decoding, streaming, and frame-indexed seeking.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::frame::{Frame, HEADER_LEN, MAX_PAYLOAD, TimeVal};

/// Reference point for [`Decoder::seek_to_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
    /// Relative to the first frame.
    Start,
    /// Relative to the current frame index.
    Current,
    /// Relative to the end of the recording.
    ///
    /// A streaming decoder does not know the total frame count, so only
    /// non-negative offsets are accepted here; they position the decoder at
    /// the end of the stream.
    End,
}

/// Reads frames back out of a recording.
///
/// The decoder is sequential; [`Decoder::seek_to_frame`] additionally allows
/// repositioning by frame index when the source supports byte seeks.
#[derive(Debug)]
pub struct Decoder<R> {
    source: R,
    frame: u64,
}

impl<R> Decoder<R> {
    /// Create a decoder reading frames from `source`.
    pub const fn new(source: R) -> Self {
        Self { source, frame: 0 }
    }

    /// Index of the next frame [`Decoder::decode_frame`] will return, which
    /// equals the number of frames decoded or skipped so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Get a mutable reference to the underlying source.
    ///
    /// Moving the source's cursor desynchronizes the frame index; callers
    /// normally only inspect position.
    pub const fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    /// Consume the decoder, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.source
    }
}

impl<R: Read> Decoder<R> {
    /// Decode the next frame.
    ///
    /// Returns [`Error::EndOfStream`] when the source is cleanly exhausted
    /// before the next header, [`Error::Truncated`] when a header or payload
    /// is cut short, and [`Error::PayloadTooLarge`] for implausible headers.
    pub fn decode_frame(&mut self) -> Result<Frame> {
        let (time, len) = self.read_header()?;
        let mut data = vec![0u8; len as usize];
        let mut filled = 0;
        while filled < data.len() {
            match self.source.read(&mut data[filled..]) {
                Ok(0) => {
                    return Err(Error::Truncated {
                        expected: len as usize,
                        actual: filled,
                    });
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::Io(err)),
            }
        }
        self.frame += 1;
        Ok(Frame { time, data })
    }

    /// Decode frames lazily until end of stream, the first decode error, or
    /// an explicit stop.
    ///
    /// The returned [`StopHandle`] lets another owner end the iteration
    /// early. The stream is not restartable mid-flight; reopen the source to
    /// decode again.
    pub fn decode_stream(&mut self) -> (FrameStream<'_, R>, StopHandle) {
        let stopped = Arc::new(AtomicBool::new(false));
        let handle = StopHandle(Arc::clone(&stopped));
        (
            FrameStream {
                decoder: self,
                stopped,
                done: false,
            },
            handle,
        )
    }

    /// Read and validate one frame header.
    ///
    /// A clean EOF before the first header byte is [`Error::EndOfStream`];
    /// a partial header is [`Error::Truncated`].
    fn read_header(&mut self) -> Result<(TimeVal, u32)> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            match self.source.read(&mut header[filled..]) {
                Ok(0) => {
                    return Err(if filled == 0 {
                        Error::EndOfStream
                    } else {
                        Error::Truncated {
                            expected: HEADER_LEN,
                            actual: filled,
                        }
                    });
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::Io(err)),
            }
        }

        let seconds = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let micro_seconds = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let len = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        if len as usize > MAX_PAYLOAD {
            return Err(Error::PayloadTooLarge {
                len,
                max: MAX_PAYLOAD,
            });
        }

        Ok((
            TimeVal {
                seconds,
                micro_seconds,
            },
            len,
        ))
    }
}

impl<R: Read + Seek> Decoder<R> {
    /// Reposition the decoder so the next [`Decoder::decode_frame`] returns
    /// the frame at the computed target index.
    ///
    /// Forward movement skips frames by reading headers and seeking over
    /// payloads without copying them. A target at or before the current
    /// index rewinds the source to the beginning and re-skips forward, since
    /// frame boundaries behind the cursor are not remembered.
    ///
    /// Returns [`Error::IllegalSeek`] for a negative target index, or for
    /// any negative offset relative to [`SeekWhence::End`]; the decoder
    /// position is unchanged in that case.
    pub fn seek_to_frame(&mut self, offset: i64, whence: SeekWhence) -> Result<()> {
        let target = match whence {
            SeekWhence::Start => offset,
            SeekWhence::Current => self.frame as i64 + offset,
            SeekWhence::End => {
                if offset < 0 {
                    return Err(Error::IllegalSeek);
                }
                return self.skip_to_end();
            }
        };
        if target < 0 {
            return Err(Error::IllegalSeek);
        }

        let target = target as u64;
        if target <= self.frame {
            self.source.seek(SeekFrom::Start(0))?;
            self.frame = 0;
        }
        while self.frame < target {
            self.skip_frame()?;
        }
        Ok(())
    }

    /// Skip one frame without copying its payload.
    fn skip_frame(&mut self) -> Result<()> {
        let (_, len) = self.read_header()?;
        self.source.seek(SeekFrom::Current(i64::from(len)))?;
        self.frame += 1;
        Ok(())
    }

    /// Skip frames until the stream is exhausted.
    fn skip_to_end(&mut self) -> Result<()> {
        loop {
            match self.skip_frame() {
                Ok(()) => {}
                Err(Error::EndOfStream) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }
}

/// Cancels a [`FrameStream`] from outside the iteration.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// End the associated stream; its next `next()` call returns `None`.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Lazy iterator over decoded frames.
///
/// Finite: terminated by end of stream, the first decode error, or the
/// paired [`StopHandle`].
#[derive(Debug)]
pub struct FrameStream<'d, R> {
    decoder: &'d mut Decoder<R>,
    stopped: Arc<AtomicBool>,
    done: bool,
}

impl<R: Read> Iterator for FrameStream<'_, R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        match self.decoder.decode_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(Error::EndOfStream) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(parts: &[&[u8]]) -> Vec<u8> {
        use std::io::Write;
        let mut encoder = crate::Encoder::new(Vec::new());
        for part in parts {
            encoder.write(part).unwrap();
        }
        encoder.into_inner()
    }

    #[test]
    fn decode_frame_advances_counter() {
        let buf = record(&[b"one", b"two"]);
        let mut decoder = Decoder::new(io::Cursor::new(buf));
        assert_eq!(decoder.frame(), 0);
        assert_eq!(decoder.decode_frame().unwrap().data, b"one");
        assert_eq!(decoder.frame(), 1);
        assert_eq!(decoder.decode_frame().unwrap().data, b"two");
        assert_eq!(decoder.frame(), 2);
    }

    #[test]
    fn clean_eof_is_end_of_stream() {
        let mut decoder = Decoder::new(io::Cursor::new(Vec::new()));
        assert!(matches!(
            decoder.decode_frame().unwrap_err(),
            Error::EndOfStream
        ));
    }

    #[test]
    fn partial_header_is_truncated() {
        let buf = record(&[b"x"]);
        let mut decoder = Decoder::new(&buf[..HEADER_LEN - 5]);
        assert!(matches!(
            decoder.decode_frame().unwrap_err(),
            Error::Truncated { expected, actual } if expected == HEADER_LEN && actual == HEADER_LEN - 5
        ));
    }

    #[test]
    fn short_payload_reports_filled_bytes() {
        let buf = record(&[b"payload"]);
        let mut decoder = Decoder::new(&buf[..buf.len() - 3]);
        assert!(matches!(
            decoder.decode_frame().unwrap_err(),
            Error::Truncated {
                expected: 7,
                actual: 4
            }
        ));
    }

    #[test]
    fn implausible_length_is_rejected() {
        let mut buf = record(&[b"x"]);
        buf[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        let mut decoder = Decoder::new(buf.as_slice());
        assert!(matches!(
            decoder.decode_frame().unwrap_err(),
            Error::PayloadTooLarge { len: u32::MAX, .. }
        ));
    }

    #[test]
    fn stream_stops_on_handle() {
        let buf = record(&[b"a", b"b", b"c"]);
        let mut decoder = Decoder::new(buf.as_slice());
        let (mut frames, stop) = decoder.decode_stream();
        assert_eq!(frames.next().unwrap().unwrap().data, b"a");
        stop.stop();
        assert!(frames.next().is_none());
    }

    #[test]
    fn stream_ends_at_first_error() {
        let mut buf = record(&[b"a", b"b"]);
        buf.truncate(buf.len() - 1);
        let mut decoder = Decoder::new(buf.as_slice());
        let (frames, _stop) = decoder.decode_stream();
        let collected: Vec<_> = frames.collect();
        assert_eq!(collected.len(), 2);
        assert!(collected[0].is_ok());
        assert!(collected[1].is_err());
    }
}
