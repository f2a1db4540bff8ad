//! Error types for the ttyrec codec.

use std::io;

/// The error type for encode, decode, and seek operations.
///
/// Codec errors are never retried internally; they propagate to the caller,
/// who decides whether to abort or continue degraded.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred on the underlying source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The source was cleanly exhausted before the next frame header.
    #[error("end of stream")]
    EndOfStream,

    /// The source ended mid-header or mid-payload.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes the frame header or payload declared.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// A frame header declared an implausibly large payload.
    ///
    /// Rejecting these avoids unbounded allocation on corrupt input.
    #[error("frame payload of {len} bytes exceeds maximum of {max}")]
    PayloadTooLarge {
        /// Declared payload length.
        len: u32,
        /// The allowed maximum, [`crate::MAX_PAYLOAD`].
        max: usize,
    },

    /// A seek computed a negative target frame index, or a backward seek
    /// was requested relative to the (unknown) end of the stream.
    #[error("illegal seek")]
    IllegalSeek,
}

/// A specialized Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(Error::IllegalSeek.to_string(), "illegal seek");
        assert_eq!(Error::EndOfStream.to_string(), "end of stream");
        let err = Error::Truncated {
            expected: 12,
            actual: 4,
        };
        assert_eq!(err.to_string(), "truncated frame: expected 12 bytes, got 4");
    }

    #[test]
    fn error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
