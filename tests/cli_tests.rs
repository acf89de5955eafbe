//! Running the `par-agent` binary.

use std::process::Command;

use tempfile::TempDir;

fn par_agent(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_par-agent"));
    cmd.env_remove("RUST_LOG")
        .arg("--config")
        .arg(dir.path().join("config.yaml"));
    cmd
}

#[test]
fn test_missing_feed_error_is_printed_once() {
    let dir = TempDir::new().expect("temp dir");
    let output = par_agent(&dir)
        .arg("replay")
        .arg(dir.path().join("missing.jsonl"))
        .output()
        .expect("run par-agent");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("Failed to open feed").count(), 1, "{stderr}");
}

