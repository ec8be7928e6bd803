//! Plain borg commands run against a configured repository.

use std::fmt;

use tracing::info;

use crate::core::config::Config;
use crate::core::constants::{BORG, BORG_REPO};
use crate::core::context::Context;
use crate::core::env::Environment;
use crate::core::process::{run_checked, Invocation};
use crate::core::repository;
use crate::error::Result;

/// borg subcommands that only need a repository environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapped {
    List,
    Info,
    Mount,
    Check,
}

impl Wrapped {
    pub fn subcommand(self) -> &'static str {
        match self {
            Wrapped::List => "list",
            Wrapped::Info => "info",
            Wrapped::Mount => "mount",
            Wrapped::Check => "check",
        }
    }

    /// Command line for `repository_env`, with `extra` appended.
    ///
    /// `borg mount` ignores `BORG_REPO`, so the location is passed as its
    /// first positional argument.
    pub fn invocation(self, repository_env: &Environment, extra: &[String]) -> Invocation {
        let mut invocation = Invocation::new(BORG).arg(self.subcommand());
        if self == Wrapped::Mount {
            if let Some(repo) = repository_env.get(BORG_REPO) {
                invocation = invocation.arg(repo);
            }
        }
        invocation.args(extra.iter().cloned()).env(repository_env)
    }
}

impl fmt::Display for Wrapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subcommand())
    }
}

/// Run `borg <command>` against `repository`, inheriting stdout and stderr.
///
/// # Errors
///
/// Returns the composer's errors, or `ProcessError::Failed` if borg exits
/// non-zero.
pub fn run_wrapped(
    ctx: &Context<'_>,
    config: &Config,
    command: Wrapped,
    repository: &str,
    extra: &[String],
) -> Result<()> {
    let agent = ctx.open_agent()?;
    let base = agent.environment().clone();
    let env = repository::build(ctx, config, repository, &base)?;

    let invocation = base.scoped(&env, |scope| command.invocation(scope, extra));
    info!(repository = %repository, "running: {}", invocation);
    run_checked(ctx.runner, &invocation)?;

    agent.close()
}
