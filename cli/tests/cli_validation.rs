//! Integration test: argument validation of the `a3s-forge` binary.
//!
//! Every case here fails before any network traffic, so the tests need no
//! build service. The config file lookup is pointed at a missing path and
//! the tower variables are removed so the host environment cannot leak in.

use std::process::{Command, Output};

use tempfile::TempDir;

fn run(args: &[&str]) -> Output {
    let home = TempDir::new().unwrap();
    Command::new(env!("CARGO_BIN_EXE_a3s-forge"))
        .args(args)
        .env("A3S_FORGE_CONFIG", home.path().join("missing.yaml"))
        .env_remove("TOWER_ACCESS_TOKEN")
        .env_remove("TOWER_WORKSPACE_ID")
        .env_remove("TOWER_API_ENDPOINT")
        .env_remove("A3S_FORGE_ENDPOINT")
        .env_remove("WAVE_ENDPOINT")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run a3s-forge")
}

fn assert_fails_with(args: &[&str], expected: &str) {
    let output = run(args);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "expected failure for {:?}", args);
    assert!(
        stderr.contains(expected),
        "stderr for {:?} did not contain {:?}:\n{}",
        args,
        expected,
        stderr
    );
}

#[test]
fn test_help_succeeds() {
    let output = run(&["submit", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--containerfile"));
    assert!(stdout.contains("--await"));
}

#[test]
fn test_missing_subcommand() {
    let output = run(&[]);
    assert!(!output.status.success());
}

#[test]
fn test_nothing_to_provision() {
    assert_fails_with(
        &["submit"],
        "Error: Provide either a image name or a container file",
    );
}

#[test]
fn test_image_and_containerfile() {
    assert_fails_with(
        &["submit", "-i", "alpine", "-f", "Containerfile"],
        "Argument --image and --containerfile conflict each other",
    );
}

#[test]
fn test_dry_run_and_await() {
    assert_fails_with(
        &["submit", "-i", "alpine", "--dry-run", "--await"],
        "Options --dry-run and --await conflict each other",
    );
}

#[test]
fn test_unsupported_platform() {
    assert_fails_with(
        &["submit", "-i", "alpine", "--platform", "windows/amd64"],
        "Unsupported container platform: 'windows/amd64'",
    );
}

#[test]
fn test_context_without_containerfile() {
    let ctx = TempDir::new().unwrap();
    assert_fails_with(
        &["submit", "-i", "alpine", "--context", ctx.path().to_str().unwrap()],
        "Option --context requires the use of a container file",
    );
}

#[test]
fn test_invalid_env() {
    assert_fails_with(
        &["submit", "-i", "alpine", "--config-env", "FOO"],
        "Invalid environment variable syntax - offending value: FOO",
    );
}

#[test]
fn test_mirror_without_build_repo() {
    assert_fails_with(
        &["submit", "-i", "alpine", "--mirror"],
        "Option --mirror requires the use of a build repository",
    );
}

#[test]
fn test_invalid_await_duration() {
    assert_fails_with(
        &["submit", "-i", "alpine", "--await", "forever"],
        "Invalid --await value",
    );
}

#[test]
fn test_invalid_endpoint_config() {
    assert_fails_with(
        &["info", "--endpoint", "wave.example.com"],
        "Endpoint must start with http:// or https://",
    );
}
