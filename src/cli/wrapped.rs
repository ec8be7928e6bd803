//! list, info, mount and check commands.

use crate::cli::RepositoryArgs;
use crate::core::config::Config;
use crate::core::context::Context;
use crate::core::dispatch::{run_wrapped, Wrapped};
use crate::core::process::Runner;
use crate::error::Result;

/// Run `borg <command>` for the repository named in `args`.
pub fn execute(
    runner: &dyn Runner,
    config: &Config,
    command: Wrapped,
    args: &RepositoryArgs,
) -> Result<()> {
    let ctx = Context::new(runner).with_signal_trap(true);
    run_wrapped(&ctx, config, command, &args.repository, &args.extra)
}
