/// Skip a test unless `$tool` is on PATH.
#[macro_export]
macro_rules! skip_without_tool {
    ($tool:expr) => {
        if which::which($tool).is_err() {
            eprintln!("SKIPPED: {} not found in PATH", $tool);
            return;
        }
    };
}
