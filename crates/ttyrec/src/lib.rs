//! ttyrec: streaming codec for terminal session recordings.
//!
//! A recording is an ordered sequence of frames, each a timestamped chunk of
//! raw terminal bytes. The on-disk layout is the classic ttyrec format:
//! a fixed 12-byte little-endian header (`seconds:u32, micro_seconds:u32,
//! len:u32`) followed by `len` payload bytes, with no trailing index. The
//! format is streaming-friendly (no pre-known total length), self-delimiting,
//! and seekable by counting records rather than parsing payload content.
//!
//! # Encoding
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::Write;
//!
//! # fn main() -> std::io::Result<()> {
//! let mut encoder = ttyrec::Encoder::new(File::create("session.ttyrec")?);
//! encoder.write(b"$ ls\r\n")?; // one call == one timestamped frame
//! # Ok(())
//! # }
//! ```
//!
//! # Decoding and replay
//!
//! ```no_run
//! use std::fs::File;
//!
//! # fn main() -> ttyrec::Result<()> {
//! let mut decoder = ttyrec::Decoder::new(File::open("session.ttyrec")?);
//! let (frames, _stop) = decoder.decode_stream();
//! let mut previous: Option<ttyrec::TimeVal> = None;
//! for frame in frames {
//!     let frame = frame?;
//!     if let Some(prev) = previous {
//!         std::thread::sleep(frame.time.sub(prev));
//!     }
//!     previous = Some(frame.time);
//!     // write frame.data to the terminal
//! }
//! # Ok(())
//! # }
//! ```

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;

pub use decoder::{Decoder, FrameStream, SeekWhence, StopHandle};
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use frame::{Frame, HEADER_LEN, MAX_PAYLOAD, TimeVal};
