//! The slave side of a proxied session.
//!
//! The proxy treats the process being bridged purely as an opaque
//! bidirectional byte channel plus a resize control and a variable-lookup
//! capability; it has no knowledge of how the process was spawned.

use std::collections::HashMap;
use std::future::Future;
use std::io;

/// Terminal geometry in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows.
    pub rows: u16,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

impl WindowSize {
    /// Create a new window size.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

/// A PTY-backed process being proxied, typically a local shell.
///
/// I/O takes `&self` so the proxy's concurrent loops can share one
/// `Arc<impl Slave>` without holding a lock across a blocking read; a PTY
/// file descriptor supports concurrent reads and writes natively.
pub trait Slave: Send + Sync + 'static {
    /// Read available bytes from the slave into `buf`.
    ///
    /// `Ok(0)` signals end of stream.
    fn read<'a>(&'a self, buf: &'a mut [u8]) -> impl Future<Output = io::Result<usize>> + Send + 'a;

    /// Write all of `data` to the slave's input.
    fn write_all<'a>(&'a self, data: &'a [u8]) -> impl Future<Output = io::Result<()>> + Send + 'a;

    /// Set a new terminal size on the slave.
    fn resize_window(&self, size: WindowSize) -> io::Result<()>;

    /// Named string variables usable for window-title templating.
    fn window_title_variables(&self) -> HashMap<String, String>;

    /// Close the slave, unblocking any pending reads.
    fn close(&self) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_size_default() {
        assert_eq!(WindowSize::default(), WindowSize::new(80, 24));
    }
}
