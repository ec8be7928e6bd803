//! Per-run settings shared by the orchestration steps.

use std::time::Duration;

use crate::core::agent::AgentSession;
use crate::core::constants::PROMPT_TIMEOUT;
use crate::core::process::Runner;
use crate::error::Result;

/// How a run talks to the outside world.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    /// Subprocess seam.
    pub runner: &'a dyn Runner,
    /// Bound on each interactive prompt wait.
    pub prompt_timeout: Duration,
    /// Kill the agent on SIGINT/SIGTERM/SIGHUP.
    pub trap_signals: bool,
}

impl<'a> Context<'a> {
    pub fn new(runner: &'a dyn Runner) -> Self {
        Self {
            runner,
            prompt_timeout: PROMPT_TIMEOUT,
            trap_signals: false,
        }
    }

    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    pub fn with_signal_trap(mut self, trap: bool) -> Self {
        self.trap_signals = trap;
        self
    }

    /// Start the ssh-agent for this run.
    pub fn open_agent(&self) -> Result<AgentSession<'a>> {
        let session = AgentSession::open(self.runner)?;
        if self.trap_signals {
            session.trap_signals()
        } else {
            Ok(session)
        }
    }
}
