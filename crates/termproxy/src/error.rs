//! Error types for the session proxy.
//!
//! The taxonomy distinguishes configuration errors (fatal at startup),
//! stream-closed signals (expected terminal conditions that end the session
//! cleanly), directional I/O write failures, recording codec errors, and
//! completion hook errors (reported but non-fatal to shutdown).

use std::io;

use thiserror::Error;

/// The error type for proxy sessions.
///
/// [`crate::ProxyTty::run`] always resolves to one of these; `SlaveClosed`,
/// `MasterClosed`, and `Canceled` describe how a session ended rather than a
/// failure, and callers map them to exit codes for diagnostics.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Recording or session setup failed at construction time.
    #[error("session setup failed: {0}")]
    Config(#[source] io::Error),

    /// The slave (shell) side closed or its read failed.
    #[error("slave side closed")]
    SlaveClosed,

    /// The master (real terminal) side closed or its read failed.
    #[error("master side closed")]
    MasterClosed,

    /// Forwarding bytes to the real terminal failed.
    #[error("failed to write to master: {0}")]
    MasterWrite(#[source] io::Error),

    /// Forwarding input to the slave failed.
    #[error("failed to write to slave: {0}")]
    SlaveWrite(#[source] io::Error),

    /// Applying a new window size to the slave failed.
    #[error("failed to resize slave terminal: {0}")]
    Resize(#[source] io::Error),

    /// Writing a frame to the recording failed.
    #[error("recording error: {0}")]
    Recording(#[from] ttyrec::Error),

    /// The completion hook reported a failure after the recording was
    /// finalized. The session shutdown itself already completed.
    #[error("completion hook failed: {0}")]
    Hook(#[from] HookError),

    /// The session was canceled via its cancellation token.
    #[error("session canceled")]
    Canceled,
}

impl ProxyError {
    /// Whether this value describes a clean session end rather than a fault.
    #[must_use]
    pub const fn is_clean_shutdown(&self) -> bool {
        matches!(self, Self::SlaveClosed | Self::MasterClosed | Self::Canceled)
    }
}

/// Error reported by a recording completion hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook failed on an I/O operation, typically while relocating the
    /// finished recording.
    #[error("hook I/O error: {0}")]
    Io(#[from] io::Error),

    /// The hook failed for another reason.
    #[error("{0}")]
    Message(String),
}

/// A specialized Result type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
