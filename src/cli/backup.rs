//! Backup command.

use crate::cli::output;
use crate::core::backup::run_backup;
use crate::core::config::Config;
use crate::core::context::Context;
use crate::core::process::Runner;
use crate::error::Result;

/// Run backup job `name`, stopping the agent on SIGINT/SIGTERM/SIGHUP.
pub fn execute(runner: &dyn Runner, config: &mut Config, name: &str) -> Result<()> {
    let ctx = Context::new(runner).with_signal_trap(true);
    run_backup(&ctx, config, name)?;
    output::success(&format!("backup {} finished", name));
    Ok(())
}
