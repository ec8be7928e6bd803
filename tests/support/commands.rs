//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::path::PathBuf;
use std::process::{Output, Stdio};

impl Test {
    /// Create a syborg command with correct environment variables.
    ///
    /// Returns a Command configured with:
    /// - HOME and XDG_CONFIG_HOME inside the temporary home directory
    /// - SYBORG_CONFIG pointing at this test's config file
    /// - NO_COLOR so output can be matched literally
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("syborg").expect("failed to find syborg binary");
        cmd.env("HOME", self.home.path());
        cmd.env("XDG_CONFIG_HOME", self.home.path().join(".config"));
        cmd.env("SYBORG_CONFIG", self.config_path());
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("SYBORG_LOG");
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// Shortcut for `syborg backup <name>`.
    pub fn backup(&self, name: &str) -> Output {
        self.cmd()
            .args(["backup", name])
            .output()
            .expect("failed to run syborg backup")
    }

    /// Shortcut for `syborg <command> <repository>`.
    pub fn wrapped(&self, command: &str, repository: &str) -> Output {
        self.cmd()
            .args([command, repository])
            .output()
            .expect("failed to run syborg")
    }

    /// Directory holding the stand-in tools written by [`Test::fake_tool`].
    pub fn bin_dir(&self) -> PathBuf {
        self.dir.path().join("bin")
    }

    /// Write an executable shell script named `name` into [`Test::bin_dir`].
    #[cfg(unix)]
    pub fn fake_tool(&self, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let dir = self.bin_dir();
        std::fs::create_dir_all(&dir).expect("failed to create bin dir");
        let path = dir.join(name);
        std::fs::write(&path, script).expect("failed to write fake tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to make fake tool executable");
        path
    }

    /// A syborg process that finds the fake tools first on PATH.
    ///
    /// Unlike [`Test::cmd`] this can be spawned and signalled.
    pub fn process(&self) -> std::process::Command {
        let path = std::env::var_os("PATH").unwrap_or_default();
        let mut dirs = vec![self.bin_dir()];
        dirs.extend(std::env::split_paths(&path));

        let mut cmd = std::process::Command::new(env!("CARGO_BIN_EXE_syborg"));
        cmd.env("HOME", self.home.path());
        cmd.env("XDG_CONFIG_HOME", self.home.path().join(".config"));
        cmd.env("SYBORG_CONFIG", self.config_path());
        cmd.env("NO_COLOR", "1");
        cmd.env("PATH", std::env::join_paths(dirs).expect("PATH is joinable"));
        cmd.env_remove("SYBORG_LOG");
        cmd.current_dir(self.dir.path());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());
        cmd
    }
}
