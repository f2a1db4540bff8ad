//! Unix PTY-backed slave implementation.
//!
//! Allocates a pseudo-terminal pair via rustix, spawns the shell on the
//! slave side with a proper session and controlling terminal, and exposes
//! the master side as a [`Slave`] with non-blocking async I/O through
//! tokio's `AsyncFd`.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};
use std::process::Stdio;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use rustix::fs::{OFlags, fcntl_setfl};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{Winsize, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::slave::{Slave, WindowSize};

/// A shell process attached to the slave side of a Unix pseudo-terminal.
///
/// The proxy reads and writes the master descriptor; resizes go through
/// `TIOCSWINSZ`, which also delivers SIGWINCH to the child's process group.
pub struct PtyCommand {
    master: AsyncFd<OwnedFd>,
    child: Mutex<Child>,
    program: String,
    pid: u32,
    open: AtomicBool,
}

impl std::fmt::Debug for PtyCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyCommand")
            .field("program", &self.program)
            .field("pid", &self.pid)
            .field("open", &self.open.load(Ordering::SeqCst))
            .finish()
    }
}

impl PtyCommand {
    /// Allocate a PTY and spawn `program` with `args` on its slave side.
    ///
    /// The child gets a new session with the slave as controlling terminal,
    /// and the PTY starts at `size`. Must be called within a tokio runtime.
    pub fn spawn<S, A>(program: S, args: &[A], size: WindowSize) -> io::Result<Self>
    where
        S: AsRef<OsStr>,
        A: AsRef<OsStr>,
    {
        let master_fd = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY).map_err(to_io)?;
        grantpt(&master_fd).map_err(to_io)?;
        unlockpt(&master_fd).map_err(to_io)?;

        let slave_path = ptsname(&master_fd, Vec::new()).map_err(to_io)?;
        let slave_path = slave_path
            .to_str()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid slave path"))?
            .to_string();

        tcsetwinsize(
            &master_fd,
            Winsize {
                ws_col: size.cols,
                ws_row: size.rows,
                ws_xpixel: 0,
                ws_ypixel: 0,
            },
        )
        .map_err(to_io)?;

        let slave_fd = rustix::fs::open(
            slave_path.as_str(),
            OFlags::RDWR | OFlags::NOCTTY,
            rustix::fs::Mode::empty(),
        )
        .map_err(to_io)?;

        // Non-blocking master for AsyncFd; the slave stays blocking for the
        // child's stdio.
        fcntl_setfl(&master_fd, OFlags::NONBLOCK).map_err(to_io)?;
        let master = AsyncFd::new(master_fd)?;

        let slave_raw = slave_fd.as_raw_fd();
        let mut cmd = Command::new(program.as_ref());
        cmd.args(args);

        // SAFETY: slave_raw is a valid open descriptor; dup keeps the three
        // stdio handles independent of slave_fd's lifetime.
        unsafe {
            cmd.stdin(Stdio::from_raw_fd(libc::dup(slave_raw)));
            cmd.stdout(Stdio::from_raw_fd(libc::dup(slave_raw)));
            cmd.stderr(Stdio::from_raw_fd(libc::dup(slave_raw)));
        }

        // SAFETY: setsid and ioctl are async-signal-safe.
        unsafe {
            cmd.pre_exec(move || {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                if libc::ioctl(slave_raw, libc::TIOCSCTTY, 0) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd.spawn()?;
        let pid = child.id().unwrap_or_default();
        let program = program.as_ref().to_string_lossy().into_owned();
        debug!(%program, pid, "spawned slave shell");

        Ok(Self {
            master,
            child: Mutex::new(child),
            program,
            pid,
            open: AtomicBool::new(true),
        })
    }

    /// Process ID of the spawned shell.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    async fn read_master(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if !self.open.load(Ordering::SeqCst) {
                return Ok(0);
            }
            let mut guard = self.master.readable().await?;
            match rustix::io::read(self.master.get_ref(), &mut *buf) {
                Ok(n) => return Ok(n),
                Err(rustix::io::Errno::AGAIN) => guard.clear_ready(),
                // EIO is how a PTY master reports the slave side going away.
                Err(err) => return Err(to_io(err)),
            }
        }
    }

    async fn write_master(&self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            if !self.open.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "PTY closed"));
            }
            let mut guard = self.master.writable().await?;
            match rustix::io::write(self.master.get_ref(), data) {
                Ok(n) => data = &data[n..],
                Err(rustix::io::Errno::AGAIN) => guard.clear_ready(),
                Err(err) => return Err(to_io(err)),
            }
        }
        Ok(())
    }
}

impl Slave for PtyCommand {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_master(buf).await
    }

    async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        self.write_master(data).await
    }

    fn resize_window(&self, size: WindowSize) -> io::Result<()> {
        tcsetwinsize(
            self.master.get_ref(),
            Winsize {
                ws_col: size.cols,
                ws_row: size.rows,
                ws_xpixel: 0,
                ws_ypixel: 0,
            },
        )
        .map_err(to_io)
    }

    fn window_title_variables(&self) -> HashMap<String, String> {
        HashMap::from([
            ("command".to_string(), self.program.clone()),
            ("pid".to_string(), self.pid.to_string()),
        ])
    }

    fn close(&self) -> io::Result<()> {
        self.open.store(false, Ordering::SeqCst);
        if let Ok(mut child) = self.child.lock() {
            let _ = child.start_kill();
        }
        Ok(())
    }
}

fn to_io(errno: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(errno.raw_os_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_and_resize() {
        // May fail in constrained CI environments without a PTY device.
        let Ok(pty) = PtyCommand::spawn("/bin/sh", &["-c", "sleep 1"], WindowSize::new(100, 30))
        else {
            return;
        };

        assert!(pty.pid() > 0);
        assert!(pty.resize_window(WindowSize::new(120, 40)).is_ok());

        let vars = pty.window_title_variables();
        assert_eq!(vars.get("command").map(String::as_str), Some("/bin/sh"));

        pty.close().unwrap();
    }

    #[tokio::test]
    async fn echo_round_trip() {
        let Ok(pty) = PtyCommand::spawn("/bin/cat", &[] as &[&str], WindowSize::default()) else {
            return;
        };

        pty.write_master(b"hello\n").await.unwrap();
        let mut buf = [0u8; 64];
        let n = pty.read_master(&mut buf).await.unwrap();
        assert!(n > 0);
        // The PTY line discipline echoes input back.
        assert!(buf[..n].starts_with(b"hello"));

        pty.close().unwrap();
    }
}
