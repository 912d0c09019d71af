//! Shared E2E test helpers for `irqbridge` binary tests.

use assert_cmd::cargo::cargo_bin_cmd;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT_BASIC: Duration = Duration::from_secs(20);

/// Build a Command for the `irqbridge` binary.
pub fn irqbridge_cmd() -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("irqbridge");
    cmd.timeout(TIMEOUT_BASIC);
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Writes `body` to `name` inside `dir` and returns its path.
pub fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create test file");
    file.write_all(body.as_bytes()).expect("write test file");
    path
}

/// Path to a bundled script under `scripts/`.
pub fn bundled(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("scripts").join(name)
}
