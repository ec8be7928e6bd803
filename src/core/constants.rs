//! Constants used throughout syborg.
//!
//! Centralizes external program names, environment variable names, prompt
//! strings and keyring parameters.

use std::time::Duration;

/// Backup engine binary.
pub const BORG: &str = "borg";

/// Remote sync binary.
pub const RCLONE: &str = "rclone";

/// Kernel keyring utility.
pub const KEYCTL: &str = "keyctl";

/// SSH agent binary.
pub const SSH_AGENT: &str = "ssh-agent";

/// SSH key loader binary.
pub const SSH_ADD: &str = "ssh-add";

/// Shell used to run secret-generating commands.
pub const SHELL: &str = "sh";

/// Prefix of every keyring entry description created by syborg.
pub const KEY_PREFIX: &str = "syborg-";

/// Keyring permission mask: possessor and user get everything, group and
/// other get nothing.
pub const KEY_PERM: &str = "0x3f3f0000";

/// Lifetime of a cached secret, in seconds (24 hours).
pub const KEY_TIMEOUT_SECS: u64 = 86_400;

/// Attempts allowed before a secret-generating command is declared wrong.
pub const MAX_SECRET_ATTEMPTS: usize = 3;

/// Upper bound for any single wait on an interactive prompt.
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable that overrides the default config path.
pub const CONFIG_ENV: &str = "SYBORG_CONFIG";

/// Config file location relative to the user config directory.
pub const CONFIG_FILE: &str = "syborg/syborg.cfg";

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "SYBORG_LOG";

/// Repository location variable (mandatory per repository).
pub const BORG_REPO: &str = "BORG_REPO";

/// Repository passphrase command variable.
pub const BORG_PASSCOMMAND: &str = "BORG_PASSCOMMAND";

/// Tells borg to read the passphrase from a file descriptor.
pub const BORG_PASSPHRASE_FD: &str = "BORG_PASSPHRASE_FD";

/// Mirror sync password command variable.
pub const RCLONE_PASSWORD_COMMAND: &str = "RCLONE_PASSWORD_COMMAND";

/// Mirror sync config password, used while validating a candidate.
pub const RCLONE_CONFIG_PASS: &str = "RCLONE_CONFIG_PASS";

/// SSH key passphrase command variable.
pub const SSH_PASSCOMMAND: &str = "SYBORG_SSH_PASSCOMMAND";

/// Optional explicit SSH key path.
pub const SSH_KEY: &str = "SYBORG_SSH_KEY";

/// Agent socket variable exported by ssh-agent.
pub const SSH_AUTH_SOCK: &str = "SSH_AUTH_SOCK";

/// Agent pid variable exported by ssh-agent.
pub const SSH_AGENT_PID: &str = "SSH_AGENT_PID";

/// ssh-add prompt asking for a passphrase.
pub const PROMPT_ENTER: &str = "Enter passphrase for";

/// ssh-add prompt after a wrong passphrase.
pub const PROMPT_BAD: &str = "Bad passphrase, try again for";

/// ssh-add confirmation after a key was loaded.
pub const PROMPT_ADDED: &str = "Identity added:";

/// Built-in `[DEFAULT]` entries, set before the user's config file is read.
pub const DEFAULT_OPTIONS: &[(&str, &str)] = &[
    ("borg.create.archive", "${archive}-{hostname}-{now:%Y-%m-%d-%H%M}"),
    ("borg.create.filter", "AME"),
    ("borg.create.compression", "zstd"),
    ("borg.create.verbose", "yes"),
    ("borg.create.stats", "yes"),
    ("borg.create.progress", "yes"),
    ("borg.create.show-rc", "yes"),
    ("borg.create.one-file-system", "yes"),
    ("borg.create.exclude-caches", "yes"),
    ("borg.prune.list", "yes"),
    ("borg.prune.prefix", "${archive}-{hostname}-"),
    ("borg.prune.show-rc", "yes"),
    ("borg.prune.keep-last", "2"),
];
