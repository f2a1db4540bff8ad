//! Frame and timestamp types shared by the encoder and decoder.

use std::time::Duration;

/// Size of the on-disk frame header in bytes: three little-endian `u32`s.
pub const HEADER_LEN: usize = 12;

/// Upper bound on a single frame payload.
///
/// Well-formed recordings stay far below this (writers chunk at 1 MiB);
/// anything larger is treated as a corrupt header.
pub const MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A timestamp with separate second and microsecond components, matching the
/// on-disk header layout.
///
/// Invariant: `micro_seconds < 1_000_000`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeVal {
    /// Whole seconds.
    pub seconds: u32,
    /// Microseconds within the second.
    pub micro_seconds: u32,
}

impl TimeVal {
    /// Create a timestamp from raw components.
    ///
    /// Microseconds at or above one second carry into the seconds field.
    #[must_use]
    pub const fn new(seconds: u32, micro_seconds: u32) -> Self {
        Self {
            seconds: seconds + micro_seconds / 1_000_000,
            micro_seconds: micro_seconds % 1_000_000,
        }
    }

    /// Decompose an elapsed duration into seconds and microseconds.
    pub fn set(&mut self, duration: Duration) {
        self.seconds = duration.as_secs() as u32;
        self.micro_seconds = duration.subsec_micros();
    }

    /// The signed difference `self - other`, saturating to zero when `other`
    /// is later.
    ///
    /// Borrows correctly across the microsecond boundary:
    /// `{1234, 567890} - {123, 456789}` is 1111s + 111101µs.
    #[must_use]
    pub fn sub(&self, other: Self) -> Duration {
        let delta = self.total_micros() - other.total_micros();
        if delta <= 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(delta as u64)
        }
    }

    fn total_micros(&self) -> i64 {
        i64::from(self.seconds) * 1_000_000 + i64::from(self.micro_seconds)
    }
}

impl From<Duration> for TimeVal {
    fn from(duration: Duration) -> Self {
        let mut tv = Self::default();
        tv.set(duration);
        tv
    }
}

/// One recorded event: a timestamped chunk of terminal bytes.
///
/// Immutable once decoded. Frames in a valid recording appear in
/// non-decreasing time order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// When the chunk was written, relative to the encoder's clock.
    pub time: TimeVal,
    /// The raw bytes, exactly as written.
    pub data: Vec<u8>,
}
