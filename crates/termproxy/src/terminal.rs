//! Control of the real (master) terminal device.
//!
//! Raw-mode entry/exit and geometry queries for the interactive endpoint,
//! plus the SIGWINCH listener feeding the proxy's resize side-channel. The
//! proxy core itself only ever consumes [`WindowSize`] values pushed onto
//! its channel.

use std::io;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::slave::WindowSize;

/// Puts the real terminal into raw mode for the lifetime of the guard.
///
/// Raw mode is required so each keystroke reaches the proxy immediately
/// instead of being line-buffered by the terminal driver.
#[derive(Debug)]
pub struct RawModeGuard(());

impl RawModeGuard {
    /// Enter raw mode.
    pub fn enable() -> io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Current geometry of the real terminal.
pub fn terminal_size() -> io::Result<WindowSize> {
    let (cols, rows) = crossterm::terminal::size()?;
    Ok(WindowSize::new(cols, rows))
}

/// Forward window-size changes of the real terminal into `resize_tx`.
///
/// Sends the current size once at startup, then one event per SIGWINCH,
/// until `token` is cancelled. Sending blocks when a resize is already
/// pending; intermediate sizes are visually redundant, so that back-pressure
/// is acceptable.
#[cfg(unix)]
pub async fn forward_resizes(
    resize_tx: mpsc::Sender<WindowSize>,
    token: CancellationToken,
) -> io::Result<()> {
    let mut sigwinch =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::window_change())?;

    if let Ok(size) = terminal_size() {
        let _ = resize_tx.send(size).await;
    }

    loop {
        tokio::select! {
            () = token.cancelled() => return Ok(()),
            changed = sigwinch.recv() => {
                if changed.is_none() {
                    return Ok(());
                }
                if let Ok(size) = terminal_size() {
                    debug!(cols = size.cols, rows = size.rows, "terminal resized");
                    let _ = resize_tx.send(size).await;
                }
            }
        }
    }
}
