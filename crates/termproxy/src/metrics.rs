//! Periodic throughput metrics for a recording session.
//!
//! A companion CSV file is written alongside each recording with the columns
//! `timestamp;input_delta;input_total;output_delta;output_total`, one line
//! immediately, one per interval, and one final line when the recorder
//! closes. The file is informational only; it is not part of the recording
//! format.

use std::fs::File;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::recorder::SessionCounters;

/// Interval between metrics lines.
pub const EMIT_INTERVAL: Duration = Duration::from_secs(10);

/// Current wall-clock time in microseconds since the Unix epoch.
pub(crate) fn timestamp_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

/// Tracks per-direction deltas and appends CSV lines.
pub(crate) struct MetricsWriter {
    file: File,
    counters: Arc<SessionCounters>,
    last_input: u64,
    last_output: u64,
}

impl MetricsWriter {
    pub(crate) fn new(file: File, counters: Arc<SessionCounters>) -> Self {
        Self {
            file,
            counters,
            last_input: 0,
            last_output: 0,
        }
    }

    /// Append one line with the deltas since the previous line.
    pub(crate) fn emit(&mut self) -> io::Result<()> {
        let input = self.counters.input_events();
        let output = self.counters.output_events();
        writeln!(
            self.file,
            "{};{};{};{};{}",
            timestamp_micros(),
            input - self.last_input,
            input,
            output - self.last_output,
            output,
        )?;
        self.file.flush()?;
        self.last_input = input;
        self.last_output = output;
        Ok(())
    }
}

/// Owns the background task emitting metrics lines on a fixed interval.
///
/// Stopped through the recorder's close path; the final line is written
/// before the task exits.
pub(crate) struct MetricsEmitter {
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsEmitter {
    /// Spawn the emitter task. Must be called within a tokio runtime.
    pub(crate) fn spawn(
        file: File,
        counters: Arc<SessionCounters>,
        interval: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut writer = MetricsWriter::new(file, counters);
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    // The first tick completes immediately, producing the
                    // initial line at session start.
                    _ = ticker.tick() => {
                        if let Err(err) = writer.emit() {
                            warn!(error = %err, "metrics emission failed");
                            return;
                        }
                    }
                }
            }
            // Final line with the totals at close.
            if let Err(err) = writer.emit() {
                warn!(error = %err, "final metrics line failed");
            }
        });
        Self {
            token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop the task and wait for its final line to be written.
    pub(crate) async fn stop(&self) {
        self.token.cancel();
        let handle = self.handle.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
