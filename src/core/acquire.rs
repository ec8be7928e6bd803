//! Validated secret acquisition.
//!
//! A secret-generating command is run at most until its output passes a
//! caller-supplied check against the real service, then the value is cached
//! in the kernel keyring. A cached entry short-circuits everything: the
//! generator and the check are skipped and prior validation is trusted.

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::core::constants::MAX_SECRET_ATTEMPTS;
use crate::core::env::Environment;
use crate::core::keyring::{replacement_command, Keyring};
use crate::core::process::{run_checked, Invocation, Runner};
use crate::error::{Result, SecretError};

/// Obtain a validated secret for `command` and return the command that
/// replaces it.
///
/// `command` runs under `sh -c` with `env` applied; its trimmed stdout is the
/// candidate. `validate` sees exactly that candidate and returns whether the
/// service accepted it.
///
/// # Errors
///
/// Returns `SecretError::WrongSecret` after three rejected candidates, or
/// the underlying error if the generator, the validator or `keyctl` fails.
pub fn acquire<F>(
    runner: &dyn Runner,
    command: &str,
    env: &Environment,
    mut validate: F,
) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    let keyring = Keyring::new(runner);
    if let Some(id) = keyring.lookup(command) {
        debug!(command = %command, "using cached secret");
        return Ok(replacement_command(&id));
    }

    for attempt in 1..=MAX_SECRET_ATTEMPTS {
        let output = run_checked(runner, &Invocation::shell(command).env(env))?;
        let raw = Zeroizing::new(output.stdout);
        let candidate = Zeroizing::new(raw.trim().to_string());

        if validate(&candidate)? {
            debug!(command = %command, attempt, "secret accepted");
            return keyring.store(command, &candidate);
        }
        warn!(command = %command, attempt, "secret rejected");
    }

    Err(SecretError::WrongSecret {
        command: command.to_string(),
    }
    .into())
}
