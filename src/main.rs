//! syborg - borg backups with validated, keyring-cached credentials.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use syborg::cli::output;
use syborg::cli::{execute, Cli};
use syborg::core::constants::LOG_ENV;
use syborg::error::{ConfigError, Error, ProcessError, SecretError};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("syborg=debug")
        } else {
            EnvFilter::new("syborg=info")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = cli.config.display().to_string();
    if let Err(e) = execute(cli) {
        let suggestion = match &e {
            Error::Config(ConfigError::MissingSection(_) | ConfigError::MissingRepo(_)) => {
                Some(format!("check {}", config_path))
            }
            Error::Process(ProcessError::NotFound { program }) => {
                Some(format!("install {} or add it to PATH", program))
            }
            Error::Secret(SecretError::WrongSecret { .. }) => {
                Some("check the passphrase command in your config".to_string())
            }
            _ => None,
        };

        output::error(&e.to_string());
        if let Some(hint) = suggestion {
            output::hint(&hint);
        }
        std::process::exit(Error::EXIT_CODE);
    }
}
