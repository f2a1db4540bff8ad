//! Terminal session proxy binary.
//!
//! Bridges the current terminal to a recorded shell session. The shell
//! comes from `TERMPROXY_SHELL` (or `TERMPROXY_SHELL_PATH` joined with the
//! invoked binary name), recordings land under `TERMPROXY_PREFIX`, and a
//! finished session is archived to `TERMPROXY_ARCHIVE_DIR` when set.

use std::env;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use termproxy::pty::PtyCommand;
use termproxy::{
    CompletionHook, HookError, ProxyConfig, ProxyError, ProxyTty, RawModeGuard, Recorder,
    RecordingConfig, terminal_size,
};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    ExitCode::from(exit_code(run().await))
}

/// Map the session outcome to an exit code reflecting how it ended: 0 for
/// a shell exit or cancellation, 1 for setup failures, 2 when the real
/// terminal went away, 8 for any other fault.
fn exit_code(result: Result<(), ProxyError>) -> u8 {
    match result {
        Ok(()) | Err(ProxyError::SlaveClosed | ProxyError::Canceled) => 0,
        Err(ProxyError::MasterClosed) => 2,
        Err(err @ ProxyError::Config(_)) => {
            eprintln!("termproxy: {err}");
            1
        }
        Err(err) => {
            eprintln!("termproxy: {err}");
            8
        }
    }
}

async fn run() -> Result<(), ProxyError> {
    let (shell, args) = resolve_shell()?;

    let size = terminal_size().unwrap_or_default();
    let pty = PtyCommand::spawn(&shell, &args, size).map_err(ProxyError::Config)?;

    // Raw mode last, so an early failure leaves the terminal sane.
    let _raw = RawModeGuard::enable().map_err(ProxyError::Config)?;

    let file_name = format!(
        "session_{}.ttyrec",
        chrono::Local::now().format("%Y_%m_%d_%H_%M_%S")
    );
    let prefix = env::var("TERMPROXY_PREFIX").unwrap_or_else(|_| ".".to_string());

    let mut recording = RecordingConfig::new(&prefix, &file_name);
    if let Ok(archive_dir) = env::var("TERMPROXY_ARCHIVE_DIR") {
        recording = recording.on_complete(archive_hook(PathBuf::from(archive_dir)));
    }

    let config = ProxyConfig::new().permit_write().with_recording(recording);
    let proxy = ProxyTty::new(tokio::io::stdin(), tokio::io::stdout(), pty, config)?;
    info!(%shell, %file_name, "session starting");

    let token = CancellationToken::new();
    let _resize_task = tokio::spawn(termproxy::terminal::forward_resizes(
        proxy.resize_events(),
        token.clone(),
    ));

    let mut session = tokio::spawn(proxy.run(token.clone()));
    let result = wait_signals(&mut session, &token).await;

    if let Err(err) = &result {
        if err.is_clean_shutdown() {
            info!(%err, "session ended");
        } else {
            warn!(%err, "session failed");
        }
    }
    result
}

/// Resolve the shell to spawn and its arguments.
///
/// `TERMPROXY_SHELL` names the shell directly; otherwise the invoked binary
/// name is looked up under `TERMPROXY_SHELL_PATH`, so symlinking the proxy
/// as `bash` runs `$TERMPROXY_SHELL_PATH/bash`.
fn resolve_shell() -> Result<(String, Vec<String>), ProxyError> {
    let args: Vec<String> = env::args().skip(1).collect();

    if let Ok(shell) = env::var("TERMPROXY_SHELL")
        && !shell.is_empty()
    {
        return Ok((shell, args));
    }

    let shell_path = env::var("TERMPROXY_SHELL_PATH").map_err(|_| {
        ProxyError::Config(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "TERMPROXY_SHELL or TERMPROXY_SHELL_PATH must be set",
        ))
    })?;

    let invoked = env::args().next().unwrap_or_default();
    let base = Path::new(&invoked)
        .file_name()
        .map_or_else(|| "sh".to_string(), |n| n.to_string_lossy().into_owned());

    let shell = Path::new(&shell_path)
        .join(base)
        .to_string_lossy()
        .into_owned();
    Ok((shell, args))
}

/// Wait for the session to finish or for termination signals.
///
/// A first SIGINT is announced and ignored so interactive `^C` keeps going
/// to the shell; a second one cancels the session. SIGTERM and SIGHUP
/// cancel immediately.
async fn wait_signals(
    session: &mut tokio::task::JoinHandle<Result<(), ProxyError>>,
    token: &CancellationToken,
) -> Result<(), ProxyError> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(ProxyError::Config)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(ProxyError::Config)?;
    let mut sighup = signal(SignalKind::hangup()).map_err(ProxyError::Config)?;

    tokio::select! {
        result = &mut *session => flatten(result),
        _ = sigterm.recv() => {
            token.cancel();
            join_session(session).await
        }
        _ = sighup.recv() => {
            token.cancel();
            join_session(session).await
        }
        _ = sigint.recv() => {
            // Raw mode: \r\n keeps the message on its own line.
            let _ = std::io::stderr().write_all(b"^C again to force close\r\n");
            tokio::select! {
                result = &mut *session => flatten(result),
                _ = sigint.recv() => {
                    let _ = std::io::stderr().write_all(b"force closing...\r\n");
                    token.cancel();
                    join_session(session).await
                }
            }
        }
    }
}

async fn join_session(
    session: &mut tokio::task::JoinHandle<Result<(), ProxyError>>,
) -> Result<(), ProxyError> {
    flatten(session.await)
}

fn flatten(
    result: Result<Result<(), ProxyError>, tokio::task::JoinError>,
) -> Result<(), ProxyError> {
    result.unwrap_or(Err(ProxyError::Canceled))
}

/// Move the finished recording and its metrics file into `archive_dir`.
fn archive_hook(archive_dir: PathBuf) -> CompletionHook {
    Box::new(move |recorder: &Recorder| {
        std::fs::create_dir_all(&archive_dir)?;

        let archive = |from: PathBuf| -> Result<(), HookError> {
            let Some(name) = from.file_name() else {
                return Err(HookError::Message(format!(
                    "recording path {} has no file name",
                    from.display()
                )));
            };
            let to = archive_dir.join(name);
            // rename fails across filesystems; fall back to copy + remove.
            if std::fs::rename(&from, &to).is_err() {
                std::fs::copy(&from, &to)?;
                std::fs::remove_file(&from)?;
            }
            info!(from = %from.display(), to = %to.display(), "archived session file");
            Ok(())
        };

        archive(recorder.recording_path())?;
        archive(recorder.metrics_path())?;
        Ok(())
    })
}

/// Route diagnostics to a file named by `TERMPROXY_LOG`.
///
/// Logging to the terminal would corrupt the raw-mode session display, so
/// without the variable no subscriber is installed.
fn init_tracing() {
    let Ok(path) = env::var("TERMPROXY_LOG") else {
        return;
    };
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .init();
}
