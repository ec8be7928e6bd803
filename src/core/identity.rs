//! Loading the SSH key into the session agent.
//!
//! `ssh-add` is driven through a terminal. The key passphrase comes from
//! `SYBORG_SSH_PASSCOMMAND` via [`acquire`], and `ssh-add` itself is the
//! validator: a candidate is typed at the prompt and the next thing ssh-add
//! prints decides whether it was right.

use std::time::{Duration, Instant};

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::core::acquire::acquire;
use crate::core::constants::{
    PROMPT_ADDED, PROMPT_BAD, PROMPT_ENTER, SSH_ADD, SSH_KEY, SSH_PASSCOMMAND,
};
use crate::core::env::{expand_home, Environment};
use crate::core::process::{run_checked, Chunk, Interactive, Invocation, Runner};
use crate::error::{ProcessError, Result, SecretError};

/// Where an ssh-add conversation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    /// Waiting for ssh-add to ask for a passphrase.
    AwaitingPrompt,
    /// A passphrase was typed; waiting for the verdict.
    Evaluating,
    /// ssh-add reported the identity as added.
    Accepted,
    /// ssh-add rejected the passphrase and asked again.
    Rejected,
}

/// An ssh-add process plus the prompt state machine driving it.
pub struct KeyAddSession {
    inner: Box<dyn Interactive>,
    state: PromptState,
    prompted: bool,
    buffer: String,
    timeout: Duration,
}

impl KeyAddSession {
    pub fn new(inner: Box<dyn Interactive>, timeout: Duration) -> Self {
        Self {
            inner,
            state: PromptState::AwaitingPrompt,
            prompted: false,
            buffer: String::new(),
            timeout,
        }
    }

    pub fn state(&self) -> PromptState {
        self.state
    }

    /// Consume output until the first passphrase prompt.
    pub fn wait_for_prompt(&mut self) -> Result<()> {
        self.expect(&[PROMPT_ENTER])?;
        self.prompted = true;
        Ok(())
    }

    /// Type `candidate` and wait for ssh-add's verdict.
    ///
    /// Returns [`PromptState::Accepted`] or [`PromptState::Rejected`]. A
    /// rejection leaves ssh-add at its retry prompt, ready for the next
    /// candidate.
    pub fn submit(&mut self, candidate: &str) -> Result<PromptState> {
        if !self.prompted {
            self.wait_for_prompt()?;
        }
        self.inner.send_line(candidate)?;
        self.state = PromptState::Evaluating;

        let verdict = self.expect(&[PROMPT_BAD, PROMPT_ADDED])?;
        self.state = if verdict == 1 {
            PromptState::Accepted
        } else {
            PromptState::Rejected
        };
        self.prompted = self.state == PromptState::Rejected;
        debug!(state = ?self.state, "ssh-add verdict");
        Ok(self.state)
    }

    /// Wait for ssh-add to exit successfully.
    pub fn finish(mut self) -> Result<()> {
        let code = self.inner.wait()?;
        if code != Some(0) {
            return Err(ProcessError::Failed {
                command: self.inner.program().to_string(),
                code,
            }
            .into());
        }
        Ok(())
    }

    /// Read output until one of `patterns` appears, returning its index.
    ///
    /// Output up to the end of the match is consumed. Gives up once the
    /// session timeout passes without a match.
    fn expect(&mut self, patterns: &[&str]) -> Result<usize> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let found = patterns
                .iter()
                .enumerate()
                .filter_map(|(i, p)| self.buffer.find(p).map(|pos| (pos, i, p.len())))
                .min();
            if let Some((pos, index, len)) = found {
                self.buffer.drain(..pos + len);
                return Ok(index);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timeout_error(patterns));
            }
            match self.inner.read_chunk(remaining)? {
                Chunk::Data(data) => self.buffer.push_str(&data),
                Chunk::Timeout => {}
                Chunk::Eof => {
                    return Err(ProcessError::PromptEof {
                        program: self.inner.program().to_string(),
                        expected: patterns.iter().map(|p| p.to_string()).collect(),
                    }
                    .into())
                }
            }
        }
    }

    fn timeout_error(&self, patterns: &[&str]) -> crate::error::Error {
        ProcessError::PromptTimeout {
            program: self.inner.program().to_string(),
            seconds: self.timeout.as_secs(),
            expected: patterns.iter().map(|p| p.to_string()).collect(),
        }
        .into()
    }
}

/// Add the repository's SSH key to the agent reachable through `env`.
///
/// Does nothing unless `SYBORG_SSH_PASSCOMMAND` is set.
///
/// # Errors
///
/// Fails if ssh-add cannot be driven, the passphrase is rejected three
/// times (or a cached one is rejected), or ssh-add exits non-zero.
pub fn load_identity(runner: &dyn Runner, env: &Environment, timeout: Duration) -> Result<()> {
    let Some(passcommand) = env.get_nonempty(SSH_PASSCOMMAND) else {
        return Ok(());
    };

    let mut inv = Invocation::new(SSH_ADD).env(env);
    if let Some(key) = env.get_nonempty(SSH_KEY) {
        inv = inv.arg(expand_home(key));
    }

    let mut session = KeyAddSession::new(runner.spawn_interactive(&inv)?, timeout);
    session.wait_for_prompt()?;

    let mut validated = false;
    let replacement = acquire(runner, passcommand, env, |candidate| {
        validated = true;
        Ok(session.submit(candidate)? == PromptState::Accepted)
    })?;

    if !validated {
        // cached: nothing was typed yet
        let output = run_checked(runner, &Invocation::shell(&replacement).env(env))?;
        let secret = Zeroizing::new(output.stdout.trim().to_string());
        if session.submit(&secret)? != PromptState::Accepted {
            return Err(SecretError::WrongSecret {
                command: replacement,
            }
            .into());
        }
    }

    session.finish()?;
    info!("ssh identity added");
    Ok(())
}
