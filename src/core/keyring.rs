//! Kernel keyring secret cache.
//!
//! Validated secrets are stored as `user` keys named after a hash of the
//! command that produced them. The entry is created in the session keyring,
//! locked down, given a timeout and then moved to the user keyring so later
//! syborg runs by the same user can find it.
//!
//! Callers never see the secret again after storing it: they get a
//! replacement command (`keyctl pipe <id>`) that prints it on demand, and
//! put that wherever the original command used to go.

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::core::constants::{KEYCTL, KEY_PERM, KEY_PREFIX, KEY_TIMEOUT_SECS};
use crate::core::process::{run_checked, Invocation, Runner};
use crate::error::Result;

/// Keyring description derived from a secret-generating command.
///
/// Pure function of the command text: the same command maps to the same
/// key in every run, so repositories sharing a command share one entry.
pub fn key_name(command: &str) -> String {
    let digest = Sha256::digest(command.as_bytes());
    format!("{}{:x}", KEY_PREFIX, digest)
}

/// Command that prints the secret stored under `key_id`.
pub fn replacement_command(key_id: &str) -> String {
    format!("{} pipe {}", KEYCTL, key_id)
}

/// Secret cache backed by `keyctl`.
pub struct Keyring<'a> {
    runner: &'a dyn Runner,
}

impl<'a> Keyring<'a> {
    pub fn new(runner: &'a dyn Runner) -> Self {
        Self { runner }
    }

    /// Id of a live cached entry for `command`, if any.
    ///
    /// Missing, expired and inaccessible entries all come back as `None`;
    /// so does a missing `keyctl`.
    pub fn lookup(&self, command: &str) -> Option<String> {
        let name = key_name(command);
        let inv = Invocation::new(KEYCTL)
            .args(["search", "@u", "user", name.as_str()])
            .capture();

        match self.runner.run(&inv) {
            Ok(out) if out.success() => {
                let id = out.stdout.trim().to_string();
                if id.is_empty() {
                    None
                } else {
                    debug!(key = %name, id = %id, "keyring hit");
                    Some(id)
                }
            }
            Ok(out) => {
                debug!(key = %name, code = ?out.code, "keyring miss");
                None
            }
            Err(e) => {
                debug!(key = %name, error = %e, "keyring lookup failed");
                None
            }
        }
    }

    /// Store `secret` for `command` and return the replacement command.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Failed` if any `keyctl` step fails.
    pub fn store(&self, command: &str, secret: &str) -> Result<String> {
        let name = key_name(command);

        let added = run_checked(
            self.runner,
            &Invocation::new(KEYCTL)
                .args(["padd", "user", name.as_str(), "@s"])
                .stdin(format!("{}\n", secret))
                .capture(),
        )?;
        let id = added.stdout.trim().to_string();

        let timeout = KEY_TIMEOUT_SECS.to_string();
        let steps: [&[&str]; 4] = [
            &["setperm", id.as_str(), KEY_PERM],
            &["timeout", id.as_str(), timeout.as_str()],
            &["link", id.as_str(), "@u"],
            &["unlink", id.as_str(), "@s"],
        ];
        for step in steps {
            run_checked(
                self.runner,
                &Invocation::new(KEYCTL).args(step.iter().copied()).quiet(),
            )?;
        }

        info!(key = %name, id = %id, "cached secret in user keyring");
        Ok(replacement_command(&id))
    }
}
