//! Subprocess execution.
//!
//! Every external program syborg talks to (borg, rclone, keyctl, ssh-agent,
//! ssh-add, `sh -c`) is started through the [`Runner`] trait. The system
//! implementation spawns real processes; tests provide a scripted one.
//!
//! ## Adding a Runner
//!
//! 1. Implement `run` for one-shot commands (stdout optionally captured)
//! 2. Implement `spawn_interactive` for prompt-driven sessions
//! 3. Implement `terminate` for processes started outside the runner

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::core::env::Environment;
use crate::error::{ProcessError, Result};

mod pty;

pub use pty::PtyProcess;

/// What happens to a child's standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stdout {
    /// Shared with syborg's own stdout.
    Inherit,
    /// Collected into [`Output::stdout`].
    Capture,
    /// Discarded.
    Null,
}

/// A fully described subprocess call.
#[derive(Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Environment,
    pub unset: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<Zeroizing<String>>,
    pub stdout: Stdout,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Environment::new(),
            unset: Vec::new(),
            cwd: None,
            stdin: None,
            stdout: Stdout::Inherit,
        }
    }

    /// `sh -c <command>` with captured output.
    pub fn shell(command: &str) -> Self {
        Self::new(crate::core::constants::SHELL)
            .args(["-c", command])
            .capture()
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, env: &Environment) -> Self {
        self.env = env.clone();
        self
    }

    /// Set a single variable on top of the overlay.
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env = self.env.with(key, value);
        self
    }

    /// Remove `key` from the inherited environment as well as the overlay.
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.env = self.env.without(&key);
        self.unset.push(key);
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Feed `input` to the child's stdin.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(Zeroizing::new(input.into()));
        self
    }

    pub fn capture(mut self) -> Self {
        self.stdout = Stdout::Capture;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.stdout = Stdout::Null;
        self
    }

    /// Program and arguments joined by spaces, for messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &self.env)
            .field("unset", &self.unset)
            .field("cwd", &self.cwd)
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .field("stdout", &self.stdout)
            .finish()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// Exit code, `None` if killed by a signal.
    pub code: Option<i32>,
    /// Captured stdout (empty unless [`Stdout::Capture`] was requested).
    pub stdout: String,
}

impl Output {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// One read from an interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(String),
    Timeout,
    Eof,
}

/// A running prompt-driven child process.
pub trait Interactive {
    /// Program name, for messages.
    fn program(&self) -> &str;

    /// Next piece of output, waiting at most `timeout`.
    fn read_chunk(&mut self, timeout: Duration) -> Result<Chunk>;

    /// Type `line` followed by a newline.
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Block until the child exits and return its exit code.
    fn wait(&mut self) -> Result<Option<i32>>;
}

/// Subprocess execution seam.
pub trait Runner {
    /// Run to completion.
    ///
    /// A non-zero exit is reported in [`Output::code`], not as an error;
    /// use [`run_checked`] when failure should abort.
    fn run(&self, invocation: &Invocation) -> Result<Output>;

    /// Start a child attached to a terminal.
    fn spawn_interactive(&self, invocation: &Invocation) -> Result<Box<dyn Interactive>>;

    /// Send SIGTERM to `pid`. A process that is already gone is not an error.
    fn terminate(&self, pid: u32) -> Result<()>;
}

/// Run and fail with `ProcessError::Failed` on a non-zero exit.
pub fn run_checked(runner: &dyn Runner, invocation: &Invocation) -> Result<Output> {
    let output = runner.run(invocation)?;
    if !output.success() {
        return Err(ProcessError::Failed {
            command: invocation.command_line(),
            code: output.code,
        }
        .into());
    }
    Ok(output)
}

/// Runner that starts real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct System;

impl System {
    fn resolve(program: &str) -> Result<PathBuf> {
        which::which(program).map_err(|_| {
            ProcessError::NotFound {
                program: program.to_string(),
            }
            .into()
        })
    }
}

impl Runner for System {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        debug!(command = %invocation, cwd = ?invocation.cwd, "running");
        let path = Self::resolve(&invocation.program)?;

        let mut cmd = Command::new(path);
        cmd.args(&invocation.args);
        for key in &invocation.unset {
            cmd.env_remove(key);
        }
        cmd.envs(invocation.env.iter());
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });
        cmd.stdout(match invocation.stdout {
            Stdout::Inherit => Stdio::inherit(),
            Stdout::Capture => Stdio::piped(),
            Stdout::Null => Stdio::null(),
        });

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        if let Some(input) = &invocation.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes())?;
            }
        }

        let output = child.wait_with_output()?;
        trace!(command = %invocation, code = ?output.status.code(), "finished");
        Ok(Output {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    fn spawn_interactive(&self, invocation: &Invocation) -> Result<Box<dyn Interactive>> {
        debug!(command = %invocation, "spawning on a terminal");
        let path = Self::resolve(&invocation.program)?;
        Ok(Box::new(PtyProcess::spawn(&path, invocation)?))
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let target = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => Pid::from_raw(raw),
            _ => return Err(ProcessError::Terminal(Errno::EINVAL).into()),
        };

        debug!(pid, "terminating");
        match kill(target, Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ProcessError::Terminal(e).into()),
        }
    }
}
