//! Per-repository environment composition.
//!
//! `env.*` keys of a `[repository.<name>]` section (and of `[DEFAULT]`)
//! become environment variables for every command run against that
//! repository. Secret-generating commands found there are validated once and
//! swapped for keyring lookups before the environment is handed out.

use tracing::{debug, info};

use crate::core::acquire::acquire;
use crate::core::config::Config;
use crate::core::constants::{
    BORG, BORG_PASSCOMMAND, BORG_PASSPHRASE_FD, BORG_REPO, RCLONE, RCLONE_CONFIG_PASS,
    RCLONE_PASSWORD_COMMAND,
};
use crate::core::context::Context;
use crate::core::env::{expand_home, Environment};
use crate::core::identity::load_identity;
use crate::core::process::{Invocation, Runner};
use crate::error::{ConfigError, Result};

/// Prefix of keys that become environment variables.
pub const ENV_PREFIX: &str = "env.";

/// Config section holding a repository.
pub fn section_name(repository: &str) -> String {
    format!("repository.{}", repository)
}

/// Plain `env.*` variables of a repository, without any secret handling.
///
/// # Errors
///
/// Returns `ConfigError::MissingSection` for an unknown repository and
/// `ConfigError::MissingRepo` when `BORG_REPO` is not set. Nothing is
/// executed.
pub fn variables(config: &Config, repository: &str) -> Result<Environment> {
    let section = section_name(repository);
    config.require_section(&section)?;

    let mut pairs = Vec::new();
    for (key, suffix) in config.keys_with_prefix(&section, ENV_PREFIX) {
        let value = config.get(&section, &key)?.unwrap_or_default();
        pairs.push((suffix.to_uppercase(), value.trim().to_string()));
    }
    let env = Environment::from_pairs(pairs);

    let Some(location) = env.get_nonempty(BORG_REPO).map(expand_home) else {
        return Err(ConfigError::MissingRepo(repository.to_string()).into());
    };
    Ok(env.with(BORG_REPO, location))
}

/// Full environment for `repository`.
///
/// Loads the repository's SSH key into the agent reachable through `base`
/// and replaces `BORG_PASSCOMMAND` with a keyring lookup.
pub fn build(
    ctx: &Context<'_>,
    config: &Config,
    repository: &str,
    base: &Environment,
) -> Result<Environment> {
    let env = variables(config, repository)?;
    debug!(repository = %repository, vars = env.len(), "repository environment");

    load_identity(ctx.runner, &base.merged(&env), ctx.prompt_timeout)?;
    cache_repository_passphrase(ctx.runner, &env, base)
}

/// Validate `BORG_PASSCOMMAND` against the repository and cache it.
///
/// A candidate is accepted when `borg info` succeeds with it on stdin.
pub fn cache_repository_passphrase(
    runner: &dyn Runner,
    env: &Environment,
    base: &Environment,
) -> Result<Environment> {
    let (Some(repo), Some(passcommand)) = (
        env.get_nonempty(BORG_REPO),
        env.get_nonempty(BORG_PASSCOMMAND),
    ) else {
        return Ok(env.clone());
    };

    let run_env = base.merged(env);
    let replacement = acquire(runner, passcommand, &run_env, |candidate| {
        let probe = Invocation::new(BORG)
            .args(["info", repo])
            .env(&run_env)
            .unset(BORG_PASSCOMMAND)
            .unset("BORG_PASSPHRASE")
            .var(BORG_PASSPHRASE_FD, "0")
            .stdin(format!("{}\n", candidate))
            .quiet();
        Ok(runner.run(&probe)?.success())
    })?;

    info!(repo = %repo, "repository passphrase ready");
    Ok(env.with(BORG_PASSCOMMAND, replacement))
}

/// Validate `RCLONE_PASSWORD_COMMAND` against the rclone config and cache it.
///
/// A candidate is accepted when `rclone config dump` can decrypt the config
/// with it.
pub fn cache_mirror_password(
    runner: &dyn Runner,
    env: &Environment,
    base: &Environment,
) -> Result<Environment> {
    let Some(passcommand) = env.get_nonempty(RCLONE_PASSWORD_COMMAND) else {
        return Ok(env.clone());
    };

    let run_env = base.merged(env);
    let replacement = acquire(runner, passcommand, &run_env, |candidate| {
        let probe = Invocation::new(RCLONE)
            .args(["config", "dump", "--ask-password=false"])
            .env(&run_env)
            .unset(RCLONE_PASSWORD_COMMAND)
            .var(RCLONE_CONFIG_PASS, candidate)
            .quiet();
        Ok(runner.run(&probe)?.success())
    })?;

    info!("mirror password ready");
    Ok(env.with(RCLONE_PASSWORD_COMMAND, replacement))
}
