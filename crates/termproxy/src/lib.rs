//! termproxy: auditing terminal session proxy and recorder.
//!
//! Sits between an interactive user and a locally spawned shell on a
//! pseudo-terminal, transparently relaying keystrokes and output while
//! capturing the full byte stream, with timestamps, to a durable
//! [`ttyrec`]-format recording. Terminal resize events are applied to the
//! shell and woven into the recording as a synthetic escape-sequence marker
//! so replay reproduces geometry changes at the correct point in time.
//!
//! # Architecture
//!
//! - [`ProxyTty`] owns the three concurrent data paths of a session:
//!   slave output to the terminal, terminal input to the slave, and the
//!   resize side-channel.
//! - [`Recorder`] couples the frame encoder to per-direction event counters
//!   and a completion hook fired once when the session ends.
//! - [`Slave`] abstracts the proxied process as an opaque byte channel with
//!   a resize control; [`PtyCommand`] is its Unix PTY implementation.
//!
//! # Example
//!
//! ```ignore
//! use termproxy::{ProxyConfig, ProxyTty, PtyCommand, RecordingConfig, WindowSize};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> termproxy::Result<()> {
//! let slave = PtyCommand::spawn("/bin/sh", &[], WindowSize::default())
//!     .map_err(termproxy::ProxyError::Config)?;
//! let config = ProxyConfig::new()
//!     .permit_write()
//!     .with_recording(RecordingConfig::new(".", "session.ttyrec"));
//! let proxy = ProxyTty::new(tokio::io::stdin(), tokio::io::stdout(), slave, config)?;
//! proxy.run(CancellationToken::new()).await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod proxy;
pub mod recorder;
pub mod slave;
pub mod terminal;

#[cfg(unix)]
pub mod pty;

// Re-export primary types
pub use config::{ProxyConfig, RecordingConfig};
pub use error::{HookError, ProxyError, Result};
pub use proxy::{MAX_BUFFER_SIZE, ProxyTty};
pub use recorder::{CompletionHook, Recorder};
pub use slave::{Slave, WindowSize};
pub use terminal::{RawModeGuard, terminal_size};

#[cfg(unix)]
pub use pty::PtyCommand;
