//! Error types.
//!
//! Errors are grouped by concern and folded into a single top-level
//! [`Error`]. Every variant is fatal for the current run; a keyring cache
//! miss is not represented here because it is never an error.

use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration problems: missing sections or keys, bad values.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("syborg config has no section \"{0}\"")]
    MissingSection(String),

    #[error("{key} was not specified in section {section}")]
    MissingKey { section: String, key: String },

    #[error("{section}.{key} is empty")]
    EmptyList { section: String, key: String },

    #[error("BORG_REPO was not set for {0}")]
    MissingRepo(String),

    #[error("{section}.{key}: not a boolean: {value}")]
    InvalidBoolean {
        section: String,
        key: String,
        value: String,
    },

    #[error("bad interpolation in {section}.{key}: {reason}")]
    Interpolation {
        section: String,
        key: String,
        reason: String,
    },

    #[error("{path}:{line}: {reason}")]
    Parse {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),
}

/// Secret acquisition failures.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("\"{command}\" provided wrong passphrase")]
    WrongSecret { command: String },
}

/// Subprocess failures.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{program} not found in PATH")]
    NotFound { program: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}", exit_label(.code))]
    Failed { command: String, code: Option<i32> },

    #[error("unexpected ssh-agent output: {0}")]
    AgentBanner(String),

    #[error("timed out after {seconds}s waiting for {program} to print one of {expected:?}")]
    PromptTimeout {
        program: String,
        seconds: u64,
        expected: Vec<String>,
    },

    #[error("{program} closed its terminal while waiting for one of {expected:?}")]
    PromptEof {
        program: String,
        expected: Vec<String>,
    },

    #[error("terminal error: {0}")]
    Terminal(#[from] nix::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl Error {
    /// Process exit code used for every fatal error.
    pub const EXIT_CODE: i32 = 2;
}

pub type Result<T> = std::result::Result<T, Error>;
