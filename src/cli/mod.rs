//! Command-line interface.

pub mod backup;
pub mod completions;
pub mod output;
pub mod wrapped;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::config::Config;
use crate::core::constants::{CONFIG_ENV, CONFIG_FILE};
use crate::core::dispatch::Wrapped;
use crate::core::process::System;
use crate::error::Result;

/// syborg - borg backups with cached, validated credentials.
#[derive(Parser)]
#[command(
    name = "syborg",
    about = "Run borg backups with validated, keyring-cached credentials",
    version
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = CONFIG_ENV, default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Run a backup job from a [backup.<name>] section
    Backup {
        /// Backup job name
        name: String,
    },

    /// List archives of a repository (borg list)
    List(RepositoryArgs),

    /// Show repository information (borg info)
    Info(RepositoryArgs),

    /// Mount a repository or archive (borg mount)
    Mount(RepositoryArgs),

    /// Verify repository consistency (borg check)
    Check(RepositoryArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments shared by the repository commands.
#[derive(clap::Args, Debug, Clone)]
pub struct RepositoryArgs {
    /// Repository name from a [repository.<name>] section
    pub repository: String,

    /// Extra arguments passed to borg
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub extra: Vec<String>,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// `<config dir>/syborg/syborg.cfg`, or a relative path if there is no
/// config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

/// Execute a command.
pub fn execute(cli: Cli) -> Result<()> {
    use Command::*;

    let Cli { config, command, .. } = cli;
    let load = || Config::load(&config);
    let runner = System;

    // Completions never read the config file.
    match command {
        Completions { shell } => completions::execute(shell),
        Backup { name } => backup::execute(&runner, &mut load()?, &name),
        List(args) => wrapped::execute(&runner, &load()?, Wrapped::List, &args),
        Info(args) => wrapped::execute(&runner, &load()?, Wrapped::Info, &args),
        Mount(args) => wrapped::execute(&runner, &load()?, Wrapped::Mount, &args),
        Check(args) => wrapped::execute(&runner, &load()?, Wrapped::Check, &args),
    }
}
