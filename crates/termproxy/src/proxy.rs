//! The proxy/multiplexer bridging a real terminal and a PTY slave.
//!
//! Three concurrent loops move bytes for a session: slave output to the real
//! terminal (mirrored into the recording), terminal input to the slave
//! (subject to write permission), and a resize side-channel applying new
//! geometry to the slave while weaving a synthetic marker into the
//! recording. The loops communicate only through one shared error channel
//! (first error wins) and the single-slot resize channel; the only shared
//! mutable resource is the outbound writer to the real terminal, protected
//! by a mutex held per write.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::recorder::Recorder;
use crate::slave::{Slave, WindowSize};

/// Ceiling for a single read from the slave.
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Read size for terminal input; enough to capture a multi-byte key
/// sequence atomically while keeping frames per keystroke.
const INPUT_BUFFER_SIZE: usize = 64;

/// A live bridging session between a real terminal and a PTY slave.
///
/// One instance exists per spawned session. [`ProxyTty::run`] consumes it
/// and blocks until the session ends.
pub struct ProxyTty<R, W, S> {
    master_in: R,
    master_out: Arc<Mutex<W>>,
    slave: Arc<S>,
    permit_write: bool,
    recorder: Option<Arc<Recorder>>,
    resize_tx: mpsc::Sender<WindowSize>,
    resize_rx: mpsc::Receiver<WindowSize>,
}

impl<R, W, S> ProxyTty<R, W, S>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    S: Slave,
{
    /// Construct an idle session from its two master halves, the slave, and
    /// a configuration.
    ///
    /// Fails when the recording files cannot be created.
    pub fn new(master_in: R, master_out: W, slave: S, config: ProxyConfig) -> Result<Self> {
        let recorder = config
            .recording
            .map(Recorder::create)
            .transpose()?
            .map(Arc::new);

        // Single-slot: only the most recent pending resize matters.
        let (resize_tx, resize_rx) = mpsc::channel(1);

        Ok(Self {
            master_in,
            master_out: Arc::new(Mutex::new(master_out)),
            slave: Arc::new(slave),
            permit_write: config.permit_write,
            recorder,
            resize_tx,
            resize_rx,
        })
    }

    /// Sender for out-of-band resize events.
    ///
    /// Clone this before calling [`ProxyTty::run`]; geometry changes pushed
    /// here are applied to the slave and recorded at the correct offset.
    #[must_use]
    pub fn resize_events(&self) -> mpsc::Sender<WindowSize> {
        self.resize_tx.clone()
    }

    /// The session recorder, when recording is enabled.
    #[must_use]
    pub fn recorder(&self) -> Option<Arc<Recorder>> {
        self.recorder.clone()
    }

    /// Run the session until cancellation or until one side closes.
    ///
    /// On return the slave is closed, which unblocks its pending reads; the
    /// loop reading the master stays parked until the caller closes that
    /// descriptor. The recorder, if any, is closed exactly once on every
    /// exit path, firing its completion hook.
    ///
    /// Returns [`ProxyError::Canceled`] when the token fired first,
    /// otherwise the first loop error: [`ProxyError::SlaveClosed`],
    /// [`ProxyError::MasterClosed`], or a directional write failure. When
    /// the session ended cleanly but finalizing the recording failed, that
    /// failure (for example [`ProxyError::Hook`]) is returned instead.
    pub async fn run(self, token: CancellationToken) -> Result<()> {
        let (err_tx, mut err_rx) = mpsc::channel::<ProxyError>(3);

        if let Some(recorder) = &self.recorder {
            recorder.start_metrics();
        }

        // Slave -> master: shell output, mirrored into the recording.
        {
            let slave = Arc::clone(&self.slave);
            let recorder = self.recorder.clone();
            let master_out = Arc::clone(&self.master_out);
            spawn_loop(err_tx.clone(), ProxyError::SlaveClosed, async move {
                let mut buf = vec![0u8; MAX_BUFFER_SIZE];
                loop {
                    let n = match slave.read(&mut buf).await {
                        Ok(0) | Err(_) => return ProxyError::SlaveClosed,
                        Ok(n) => n,
                    };
                    if let Err(err) =
                        forward_to_master(&master_out, recorder.as_deref(), &buf[..n]).await
                    {
                        return err;
                    }
                    if let Some(recorder) = &recorder {
                        recorder.record_output();
                    }
                }
            });
        }

        // Master -> slave: terminal input, gated on write permission.
        {
            let slave = Arc::clone(&self.slave);
            let recorder = self.recorder.clone();
            let permit_write = self.permit_write;
            let mut master_in = self.master_in;
            spawn_loop(err_tx.clone(), ProxyError::MasterClosed, async move {
                let mut buf = [0u8; INPUT_BUFFER_SIZE];
                loop {
                    let n = match master_in.read(&mut buf).await {
                        Ok(0) | Err(_) => return ProxyError::MasterClosed,
                        Ok(n) => n,
                    };
                    if !permit_write {
                        // Read-only observer mode: consume and discard.
                        continue;
                    }
                    if let Some(recorder) = &recorder {
                        recorder.record_input();
                    }
                    if let Err(err) = slave.write_all(&buf[..n]).await {
                        return ProxyError::SlaveWrite(err);
                    }
                }
            });
        }

        // Resize side-channel: apply geometry, weave a marker into the
        // session at the correct relative offset.
        {
            let slave = Arc::clone(&self.slave);
            let recorder = self.recorder.clone();
            let master_out = Arc::clone(&self.master_out);
            let mut resize_rx = self.resize_rx;
            spawn_loop(err_tx.clone(), ProxyError::SlaveClosed, async move {
                loop {
                    let Some(size) = resize_rx.recv().await else {
                        // All senders dropped; nothing further to apply.
                        return ProxyError::MasterClosed;
                    };
                    debug!(cols = size.cols, rows = size.rows, "applying resize");
                    if let Err(err) = slave.resize_window(size) {
                        return ProxyError::Resize(err);
                    }
                    if recorder.is_some() {
                        let marker = resize_marker(size);
                        if let Err(err) =
                            forward_to_master(&master_out, recorder.as_deref(), marker.as_bytes())
                                .await
                        {
                            return err;
                        }
                    }
                }
            });
        }

        // First result wins; later loop errors are dropped with the channel,
        // which is fine since the session is terminating anyway.
        let result = tokio::select! {
            () = token.cancelled() => Err(ProxyError::Canceled),
            err = err_rx.recv() => Err(err.unwrap_or(ProxyError::Canceled)),
        };

        // Unblocks the abandoned loops' pending slave reads.
        if let Err(err) = self.slave.close() {
            debug!(error = %err, "slave close failed");
        }

        if let Some(recorder) = &self.recorder
            && let Err(err) = recorder.close().await
        {
            // A close or hook failure outranks a clean session end, but a
            // prior loop fault is the more useful result.
            if matches!(&result, Err(session_err) if session_err.is_clean_shutdown()) {
                return Err(err);
            }
            warn!(error = %err, "recorder close reported an error");
        }

        result
    }
}

/// The xterm window-size escape sequence for `size`, `ESC [ 8 ; rows ; cols t`.
fn resize_marker(size: WindowSize) -> String {
    format!("\x1b[8;{};{}t", size.rows, size.cols)
}

/// Record `data` and forward it to the real terminal as one atomic write.
///
/// All writers to the master share this path, so shell output and resize
/// markers never interleave at sub-write granularity, in the recording or on
/// screen.
async fn forward_to_master<W: AsyncWrite + Unpin>(
    master_out: &Mutex<W>,
    recorder: Option<&Recorder>,
    data: &[u8],
) -> Result<()> {
    let mut out = master_out.lock().await;
    if let Some(recorder) = recorder {
        recorder.write(data)?;
    }
    out.write_all(data).await.map_err(ProxyError::MasterWrite)?;
    out.flush().await.map_err(ProxyError::MasterWrite)?;
    Ok(())
}

/// Spawn one proxy loop behind a fault boundary.
///
/// A loop's failure domain is isolated: an unexpected panic inside an
/// iteration is converted into that loop's stream-closed result instead of
/// crashing the process. The error channel has room for every loop, so the
/// send never blocks.
fn spawn_loop<F>(err_tx: mpsc::Sender<ProxyError>, on_panic: ProxyError, body: F)
where
    F: Future<Output = ProxyError> + Send + 'static,
{
    tokio::spawn(async move {
        let err = match AssertUnwindSafe(body).catch_unwind().await {
            Ok(err) => err,
            Err(_) => {
                warn!("proxy loop panicked; treating as closed stream");
                on_panic
            }
        };
        let _ = err_tx.try_send(err);
    });
}
