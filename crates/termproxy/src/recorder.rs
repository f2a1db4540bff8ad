//! Session recording.
//!
//! A [`Recorder`] couples a [`ttyrec::Encoder`] to per-direction event
//! counters and a completion hook. It is bound 1:1 to one recording while
//! open: created when the proxy starts, written on every transferred chunk,
//! and closed exactly once when the session ends.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::config::RecordingConfig;
use crate::error::{HookError, ProxyError};
use crate::metrics::{EMIT_INTERVAL, MetricsEmitter, MetricsWriter};

/// Invoked exactly once with the finalized recorder after its files are
/// flushed and closed, so a caller can relocate or archive them.
pub type CompletionHook =
    Box<dyn Fn(&Recorder) -> std::result::Result<(), HookError> + Send + Sync>;

/// Monotonically increasing per-direction event counters.
///
/// Events, not bytes: the operationally interesting signal is how many
/// keystrokes and output chunks moved per interval.
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    input_events: AtomicU64,
    output_events: AtomicU64,
}

impl SessionCounters {
    pub(crate) fn record_input(&self) {
        self.input_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_output(&self) {
        self.output_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn input_events(&self) -> u64 {
        self.input_events.load(Ordering::Relaxed)
    }

    pub(crate) fn output_events(&self) -> u64 {
        self.output_events.load(Ordering::Relaxed)
    }
}

/// Adapts the frame encoder into a sink the proxy can write to from either
/// data direction, while tracking direction-specific throughput.
pub struct Recorder {
    encoder: Mutex<Option<ttyrec::Encoder<File>>>,
    /// Held until the metrics task starts with the proxy loops.
    metrics_file: Mutex<Option<File>>,
    emitter: Mutex<Option<MetricsEmitter>>,
    counters: Arc<SessionCounters>,
    file_name: String,
    path_prefix: PathBuf,
    hook: Option<CompletionHook>,
    closed: AtomicBool,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("file_name", &self.file_name)
            .field("path_prefix", &self.path_prefix)
            .field("input_events", &self.input_events())
            .field("output_events", &self.output_events())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl Recorder {
    /// Create the recording and metrics files for `config`.
    ///
    /// Fails with [`ProxyError::Config`] when either file cannot be created,
    /// which aborts session construction.
    pub fn create(config: RecordingConfig) -> Result<Self, ProxyError> {
        let recording_path = config.path_prefix.join(&config.file_name);
        let file = File::create(&recording_path).map_err(ProxyError::Config)?;
        let metrics_file =
            File::create(metrics_path(&config.path_prefix, &config.file_name))
                .map_err(ProxyError::Config)?;
        debug!(path = %recording_path.display(), "recording session");

        Ok(Self {
            encoder: Mutex::new(Some(ttyrec::Encoder::new(file))),
            metrics_file: Mutex::new(Some(metrics_file)),
            emitter: Mutex::new(None),
            counters: Arc::new(SessionCounters::default()),
            file_name: config.file_name,
            path_prefix: config.path_prefix,
            hook: config.on_complete,
            closed: AtomicBool::new(false),
        })
    }

    /// Write one frame to the recording.
    ///
    /// Usable as a generic sink from either data direction; counters are
    /// the proxy's responsibility, not this method's.
    pub fn write(&self, data: &[u8]) -> ttyrec::Result<usize> {
        let mut guard = self.encoder.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_mut() {
            Some(encoder) => Ok(encoder.write_frame(data)?),
            None => Err(ttyrec::Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "recording closed",
            ))),
        }
    }

    /// Count one input event (a keystroke chunk read from the master).
    pub fn record_input(&self) {
        if !self.closed.load(Ordering::SeqCst) {
            self.counters.record_input();
        }
    }

    /// Count one output event (a chunk read from the slave).
    pub fn record_output(&self) {
        if !self.closed.load(Ordering::SeqCst) {
            self.counters.record_output();
        }
    }

    /// Start the periodic metrics emission.
    ///
    /// Called by the proxy when its loops start; a no-op if already started.
    pub(crate) fn start_metrics(&self) {
        let file = self
            .metrics_file
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(file) = file {
            let emitter = MetricsEmitter::spawn(file, Arc::clone(&self.counters), EMIT_INTERVAL);
            *self.emitter.lock().unwrap_or_else(|e| e.into_inner()) = Some(emitter);
        }
    }

    /// Finalize the recording.
    ///
    /// Exactly once: stops counter updates, stops the metrics task and
    /// writes its final line, flushes and closes the storage handle, and
    /// only then invokes the completion hook, so a hook that inspects the
    /// files sees them complete. Subsequent calls are no-ops.
    ///
    /// A hook failure is returned as [`ProxyError::Hook`] but the recording
    /// stays finalized; it is never reopened or retried.
    pub async fn close(&self) -> Result<(), ProxyError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let emitter = self
            .emitter
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(emitter) = emitter {
            emitter.stop().await;
        } else if let Some(file) = self
            .metrics_file
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            // Metrics never started (the session ended before the loops
            // ran); still leave one line with the totals.
            let _ = MetricsWriter::new(file, Arc::clone(&self.counters)).emit();
        }

        let encoder = self
            .encoder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut encoder) = encoder {
            encoder.flush().map_err(ttyrec::Error::Io)?;
        }

        debug!(
            file = %self.file_name,
            input_events = self.input_events(),
            output_events = self.output_events(),
            "recording closed"
        );

        if let Some(hook) = &self.hook {
            hook(self)?;
        }
        Ok(())
    }

    /// Whether the recorder has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// File name of the recording.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Directory the recording was created in.
    #[must_use]
    pub fn path_prefix(&self) -> &Path {
        &self.path_prefix
    }

    /// Full path of the recording file.
    #[must_use]
    pub fn recording_path(&self) -> PathBuf {
        self.path_prefix.join(&self.file_name)
    }

    /// Full path of the companion metrics file.
    #[must_use]
    pub fn metrics_path(&self) -> PathBuf {
        metrics_path(&self.path_prefix, &self.file_name)
    }

    /// Total input events counted.
    #[must_use]
    pub fn input_events(&self) -> u64 {
        self.counters.input_events()
    }

    /// Total output events counted.
    #[must_use]
    pub fn output_events(&self) -> u64 {
        self.counters.output_events()
    }
}

fn metrics_path(prefix: &Path, file_name: &str) -> PathBuf {
    prefix.join(format!("{file_name}.csv"))
}
