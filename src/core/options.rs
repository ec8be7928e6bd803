//! borg command-line options from configuration keys.
//!
//! Any key `borg.<subcommand>.<name>` visible from a section becomes the
//! option `--<name>`. Whether an option is a flag or takes a value is decided
//! by an explicit allow-list, never by looking at the value.

use crate::core::config::Config;
use crate::error::{ConfigError, Result};

/// Config namespace holding engine options.
pub const ENGINE_PREFIX: &str = "borg";

/// Options that are flags for every borg subcommand.
pub const COMMON_FLAGS: &[&str] = &[
    "critical",
    "error",
    "warning",
    "info",
    "v",
    "verbose",
    "debug",
    "p",
    "progress",
    "log-json",
    "show-rc",
    "consider-part-files",
];

/// Flags specific to `borg create`.
pub const CREATE_FLAGS: &[&str] = &[
    "dry-run",
    "stats",
    "list",
    "json",
    "no-cache-sync",
    "no-files-cache",
    "exclude-caches",
    "keep-exclude-tags",
    "keep-tag-files",
    "exclude-nodump",
    "one-file-system",
    "numeric-owner",
    "noatime",
    "noctime",
    "nobirthtime",
    "nobsdflags",
    "ignore-inode",
    "read-special",
];

/// `borg create` options syborg builds itself from archive sections.
pub const CREATE_EXCLUDED: &[&str] = &[
    "e",
    "exclude",
    "exclude-from",
    "pattern",
    "patterns-from",
    "archive",
];

/// Flags specific to `borg prune`.
pub const PRUNE_FLAGS: &[&str] = &["dry-run", "force", "s", "stats", "list", "save-space"];

/// A configured option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// `--name` when true, omitted when false.
    Flag(bool),
    /// `--name value`.
    Value(String),
}

/// Options for `borg <subcommand>` as seen from `section`, in key discovery
/// order.
///
/// # Errors
///
/// Returns `ConfigError::InvalidBoolean` if a flag has a non-boolean value,
/// or an interpolation error from the config.
pub fn collect(
    config: &Config,
    subcommand: &str,
    section: &str,
    flags: &[&str],
    excluded: &[&str],
) -> Result<Vec<(String, OptionValue)>> {
    let prefix = format!("{}.{}.", ENGINE_PREFIX, subcommand);
    let mut options = Vec::new();

    for (key, name) in config.keys_with_prefix(section, &prefix) {
        if excluded.contains(&name.as_str()) {
            continue;
        }
        let is_flag = COMMON_FLAGS.contains(&name.as_str()) || flags.contains(&name.as_str());
        let value = if is_flag {
            let flag = config.get_bool(section, &key)?.ok_or_else(|| ConfigError::MissingKey {
                section: section.to_string(),
                key: key.clone(),
            })?;
            OptionValue::Flag(flag)
        } else {
            OptionValue::Value(config.get(section, &key)?.unwrap_or_default())
        };
        options.push((name, value));
    }

    Ok(options)
}

/// Render options as command-line tokens.
pub fn to_args(options: &[(String, OptionValue)]) -> Vec<String> {
    let mut args = Vec::new();
    for (name, value) in options {
        match value {
            OptionValue::Flag(false) => {}
            OptionValue::Flag(true) => args.push(format!("--{}", name)),
            OptionValue::Value(v) => {
                args.push(format!("--{}", name));
                args.push(v.clone());
            }
        }
    }
    args
}

/// [`collect`] followed by [`to_args`].
pub fn extract(
    config: &Config,
    subcommand: &str,
    section: &str,
    flags: &[&str],
    excluded: &[&str],
) -> Result<Vec<String>> {
    Ok(to_args(&collect(config, subcommand, section, flags, excluded)?))
}
