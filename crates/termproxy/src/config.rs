//! Session configuration.

use std::fmt;
use std::path::PathBuf;

use crate::recorder::CompletionHook;

/// Configuration for a [`crate::ProxyTty`] session.
#[derive(Debug, Default)]
pub struct ProxyConfig {
    /// Whether input from the real terminal is forwarded to the slave.
    ///
    /// When disabled the session is a read-only observer: input is read but
    /// silently discarded, and the input event counter never increments.
    pub permit_write: bool,
    /// Recording setup; `None` disables recording.
    pub recording: Option<RecordingConfig>,
}

impl ProxyConfig {
    /// A read-only configuration with recording disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept input from the real terminal.
    #[must_use]
    pub const fn permit_write(mut self) -> Self {
        self.permit_write = true;
        self
    }

    /// Enable recording with the given configuration.
    #[must_use]
    pub fn with_recording(mut self, recording: RecordingConfig) -> Self {
        self.recording = Some(recording);
        self
    }
}

/// Where a recording is written and what happens when it is finished.
pub struct RecordingConfig {
    /// Directory the recording and its metrics file are created in.
    pub path_prefix: PathBuf,
    /// File name of the recording; the metrics file is `<file_name>.csv`.
    pub file_name: String,
    /// Invoked exactly once with the finalized recorder after close.
    pub on_complete: Option<CompletionHook>,
}

impl RecordingConfig {
    /// Record to `path_prefix/file_name` with no completion hook.
    pub fn new(path_prefix: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            file_name: file_name.into(),
            on_complete: None,
        }
    }

    /// Set the completion hook.
    #[must_use]
    pub fn on_complete(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }
}

impl fmt::Debug for RecordingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingConfig")
            .field("path_prefix", &self.path_prefix)
            .field("file_name", &self.file_name)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}
