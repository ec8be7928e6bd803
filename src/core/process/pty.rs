//! Pseudo-terminal backed child processes.
//!
//! `ssh-add` only asks for a passphrase on a terminal, so it is started as
//! the session leader of a fresh pty whose slave side becomes its controlling
//! terminal. syborg keeps the master side and reads prompts from it.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use nix::libc;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::pty::{openpty, OpenptyResult};
use tracing::trace;

use super::{Chunk, Interactive, Invocation};
use crate::error::{ProcessError, Result};

/// Bytes read from the master side per chunk.
const READ_BUFFER: usize = 1024;

/// A child process attached to a pty.
pub struct PtyProcess {
    program: String,
    child: Child,
    master: File,
}

impl PtyProcess {
    /// Spawn `path` with the arguments, environment and working directory of
    /// `invocation`, all three standard streams on the pty slave.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Terminal` if the pty cannot be allocated and
    /// `ProcessError::Spawn` if the child cannot be started.
    pub fn spawn(path: &Path, invocation: &Invocation) -> Result<Self> {
        let OpenptyResult { master, slave } =
            openpty(None, None).map_err(ProcessError::Terminal)?;

        let mut cmd = Command::new(path);
        cmd.args(&invocation.args);
        for key in &invocation.unset {
            cmd.env_remove(key);
        }
        cmd.envs(invocation.env.iter())
            .stdin(Stdio::from(slave.try_clone()?))
            .stdout(Stdio::from(slave.try_clone()?))
            .stderr(Stdio::from(slave));
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        // SAFETY: only async-signal-safe calls (setsid, ioctl) run between
        // fork and exec.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(io::Error::from)?;
                if libc::ioctl(0, libc::TIOCSCTTY, 0) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        Ok(Self {
            program: invocation.program.clone(),
            child,
            master: File::from(master),
        })
    }
}

impl Interactive for PtyProcess {
    fn program(&self) -> &str {
        &self.program
    }

    fn read_chunk(&mut self, timeout: Duration) -> Result<Chunk> {
        let timeout_ms = timeout.as_millis().min(u16::MAX as u128) as u16;
        let ready = {
            let mut fds = [PollFd::new(self.master.as_fd(), PollFlags::POLLIN)];
            poll(&mut fds, PollTimeout::from(timeout_ms)).map_err(ProcessError::Terminal)?
        };
        if ready == 0 {
            return Ok(Chunk::Timeout);
        }

        let mut buf = [0u8; READ_BUFFER];
        match self.master.read(&mut buf) {
            Ok(0) => Ok(Chunk::Eof),
            Ok(n) => {
                let data = String::from_utf8_lossy(&buf[..n]).into_owned();
                trace!(program = %self.program, bytes = n, "pty output");
                Ok(Chunk::Data(data))
            }
            // Linux reports a hung-up slave as EIO on the master.
            Err(e) if e.raw_os_error() == Some(libc::EIO) => Ok(Chunk::Eof),
            Err(e) => Err(e.into()),
        }
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.master.write_all(line.as_bytes())?;
        self.master.write_all(b"\n")?;
        self.master.flush()?;
        Ok(())
    }

    fn wait(&mut self) -> Result<Option<i32>> {
        // Drain remaining output so the child never blocks on a full pty.
        loop {
            match self.read_chunk(Duration::from_millis(100))? {
                Chunk::Eof => break,
                Chunk::Data(_) => continue,
                Chunk::Timeout => {
                    if let Some(status) = self.child.try_wait()? {
                        return Ok(status.code());
                    }
                }
            }
        }
        Ok(self.child.wait()?.code())
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
