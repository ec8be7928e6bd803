//! Scoped ssh-agent sessions.
//!
//! A session starts a private `ssh-agent`, hands its socket to child
//! processes through an [`Environment`] overlay and kills the agent when the
//! session is dropped, whatever happened in between. An optional
//! [`SignalGuard`] extends that guarantee to SIGINT, SIGTERM and SIGHUP.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::flag;
use signal_hook::iterator::{Handle, Signals};
use tracing::{debug, info, warn};

use crate::core::constants::{SSH_AGENT, SSH_AGENT_PID, SSH_AUTH_SOCK};
use crate::core::env::Environment;
use crate::core::process::{run_checked, Invocation, Runner};
use crate::error::{ProcessError, Result};

/// Socket and pid announced by a freshly started agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHandle {
    pub socket: String,
    pub pid: u32,
}

/// Parse the Bourne-shell banner printed by `ssh-agent -s`.
///
/// The pid must name a single process: zero and values outside the
/// positive `pid_t` range are rejected.
///
/// ```text
/// SSH_AUTH_SOCK=/tmp/ssh-XXXX/agent.41; export SSH_AUTH_SOCK;
/// SSH_AGENT_PID=42; export SSH_AGENT_PID;
/// echo Agent pid 42;
/// ```
pub fn parse_banner(banner: &str) -> Result<AgentHandle> {
    let mut socket = None;
    let mut pid = None;

    for line in banner.lines() {
        let assignment = line.split(';').next().unwrap_or_default().trim();
        match assignment.split_once('=') {
            Some((SSH_AUTH_SOCK, value)) => socket = Some(value.to_string()),
            Some((SSH_AGENT_PID, value)) => {
                pid = Some(
                    value
                        .parse::<u32>()
                        .ok()
                        .filter(|pid| *pid != 0 && i32::try_from(*pid).is_ok())
                        .ok_or_else(|| ProcessError::AgentBanner(line.to_string()))?,
                )
            }
            _ => {}
        }
    }

    match (socket, pid) {
        (Some(socket), Some(pid)) if !socket.is_empty() => Ok(AgentHandle { socket, pid }),
        _ => Err(ProcessError::AgentBanner(banner.trim().to_string()).into()),
    }
}

/// A running agent owned by this process.
pub struct AgentSession<'a> {
    runner: &'a dyn Runner,
    handle: AgentHandle,
    env: Environment,
    released: bool,
    guard: Option<SignalGuard>,
}

impl<'a> AgentSession<'a> {
    /// Start an agent.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Failed` if `ssh-agent` fails and
    /// `ProcessError::AgentBanner` if its output cannot be understood.
    pub fn open(runner: &'a dyn Runner) -> Result<Self> {
        let output = run_checked(runner, &Invocation::new(SSH_AGENT).arg("-s").capture())?;
        let handle = parse_banner(&output.stdout)?;
        info!(socket = %handle.socket, pid = handle.pid, "ssh-agent started");

        let env = Environment::new()
            .with(SSH_AUTH_SOCK, handle.socket.clone())
            .with(SSH_AGENT_PID, handle.pid.to_string());

        Ok(Self {
            runner,
            handle,
            env,
            released: false,
            guard: None,
        })
    }

    /// Also kill the agent if the process receives a termination signal.
    pub fn trap_signals(mut self) -> Result<Self> {
        self.guard = Some(SignalGuard::install(self.handle.pid)?);
        Ok(self)
    }

    pub fn handle(&self) -> &AgentHandle {
        &self.handle
    }

    /// Overlay exposing the agent to child processes.
    ///
    /// Empty once the session has been closed.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Tear the session down and report any failure.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.guard = None;
        self.env = Environment::new();
        debug!(pid = self.handle.pid, "stopping ssh-agent");
        self.runner.terminate(self.handle.pid)
    }
}

impl Drop for AgentSession<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(pid = self.handle.pid, error = %e, "failed to stop ssh-agent");
        }
    }
}

/// Kills an agent and exits when a termination signal arrives.
///
/// Dropping the guard stops the watcher thread. The signals then get their
/// default action back, so a later SIGINT still terminates the process.
pub struct SignalGuard {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
    restore_default: Arc<AtomicBool>,
}

impl SignalGuard {
    const SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGHUP];

    /// Watch SIGINT, SIGTERM and SIGHUP on a background thread.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Terminal` if `pid` is not a valid process id,
    /// or the I/O error from registering the handlers.
    pub fn install(pid: u32) -> Result<Self> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let target = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => Pid::from_raw(raw),
            _ => return Err(ProcessError::Terminal(Errno::EINVAL).into()),
        };

        // Inert until the guard is dropped.
        let restore_default = Arc::new(AtomicBool::new(false));
        for signal in Self::SIGNALS {
            flag::register_conditional_default(signal, Arc::clone(&restore_default))?;
        }

        let mut signals = Signals::new(Self::SIGNALS)?;
        let handle = signals.handle();
        let thread = std::thread::spawn(move || {
            if let Some(signal) = signals.forever().next() {
                warn!(signal, pid, "signal received, stopping ssh-agent");
                let _ = kill(target, Signal::SIGTERM);
                std::process::exit(128 + signal);
            }
        });

        Ok(Self {
            handle,
            thread: Some(thread),
            restore_default,
        })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.restore_default.store(true, Ordering::SeqCst);
    }
}
