//! CLI subprocess integration tests.
//!
//! These tests invoke the `lxdev` binary against the in-memory mock backend
//! and check exit codes, stdout content, and JSON output. The mock keeps no
//! state between processes, so containers created by one invocation are
//! reported as absent by the next.

use std::path::Path;
use std::process::{Command, Output};

fn lxdev_bin(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lxdev"));
    cmd.env("LXDEV_BACKEND", "mock")
        .env("LXDEV_SKIP_PREREQS", "1")
        .env_remove("LXDEV_LOG")
        .arg("--dir")
        .arg(dir);
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    lxdev_bin(dir).args(args).output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn init_project(dir: &Path) {
    let output = run(dir, &["init", "--name", "acme"]);
    assert!(output.status.success(), "init failed: {}", stderr(&output));
}

const DOCUMENT: &str = r#"project: acme
defaults:
  ports: [3000]
containers:
  web:
    image: "ubuntu:24.04"
  db:
    image: "postgres:16"
    ports: [5432]
"#;

fn write_document(dir: &Path) {
    std::fs::write(dir.join("containers.yaml"), DOCUMENT).unwrap();
}

#[test]
fn cli_version_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("lxdev"));
}

#[test]
fn cli_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["--help"]);
    assert!(output.status.success());
    let out = stdout(&output);
    for cmd in ["init", "mount", "unmount", "mounts", "sync-entry", "snapshot"] {
        assert!(out.contains(cmd), "help must list '{cmd}': {out}");
    }
}

#[test]
fn cli_init_writes_document() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(
        dir.path(),
        &["init", "--name", "acme", "--port", "3000,8080", "--user", "alice"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("acme"));

    let yaml = std::fs::read_to_string(dir.path().join("containers.yaml")).unwrap();
    assert!(yaml.contains("project: acme"));
    assert!(yaml.contains("alice"));
    assert!(yaml.contains("8080"));
}

#[test]
fn cli_init_twice_fails() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    let output = run(dir.path(), &["init"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("already exists"));
}

#[test]
fn cli_init_rejects_bad_name() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["init", "--name", "bad name"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!dir.path().join("containers.yaml").exists());
}

#[test]
fn cli_without_project_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["list"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("lxdev init"));
}

#[test]
fn cli_invalid_document_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("containers.yaml"),
        "project: acme\ncontainers:\n  \"bad name\":\n    image: ubuntu\n",
    )
    .unwrap();
    let output = run(dir.path(), &["list"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).starts_with("error:"));
}

#[test]
fn cli_list_json_output_stable() {
    let dir = tempfile::tempdir().unwrap();
    write_document(dir.path());

    let output = run(dir.path(), &["--json", "list"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let rows: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0]["name"], "db");
    assert_eq!(rows[0]["status"], "NOT FOUND");
    assert_eq!(rows[0]["ports"], serde_json::json!([5432]));
    assert_eq!(rows[1]["name"], "web");
    assert_eq!(rows[1]["ports"], serde_json::json!([3000]));
    assert!(rows[1]["ip"].is_null());
}

#[test]
fn cli_list_empty_project() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    let output = run(dir.path(), &["list"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("no containers declared"));
}

#[test]
fn cli_create_declares_container() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());

    let output = run(dir.path(), &["create", "web", "ubuntu:24.04", "--port", "5173"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let yaml = std::fs::read_to_string(dir.path().join("containers.yaml")).unwrap();
    assert!(yaml.contains("web:"));
    assert!(yaml.contains("ubuntu:24.04"));
    assert!(yaml.contains("5173"));
    assert!(yaml.contains("initial-state"));

    // A fresh process gets a fresh mock runtime.
    let output = run(dir.path(), &["--json", "list"]);
    let rows: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(rows[0]["status"], "NOT FOUND");
}

#[test]
fn cli_create_rejects_invalid_name() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    let output = run(dir.path(), &["create", "-bad", "ubuntu:24.04"]);
    assert_ne!(output.status.code(), Some(0));

    let output = run(dir.path(), &["create", "my_web", "ubuntu:24.04"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_sync_entries_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    write_document(dir.path());

    let output = run(dir.path(), &["sync-entry", "add", "web", "./app", "~/app"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let output = run(dir.path(), &["sync-entry", "add", "web", ".env", "/srv/.env"]);
    assert!(output.status.success());

    let output = run(dir.path(), &["--json", "sync-entry", "list", "web"]);
    let entries: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 2);
    assert_eq!(entries[0]["source"], "./app");
    assert_eq!(entries[0]["dest"], "~/app");

    let output = run(dir.path(), &["sync-entry", "rm", "web", "./app"]);
    assert!(output.status.success());
    let output = run(dir.path(), &["sync-entry", "rm", "web", "./app"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn cli_sync_entry_rejects_relative_dest() {
    let dir = tempfile::tempdir().unwrap();
    write_document(dir.path());
    let output = run(dir.path(), &["sync-entry", "add", "web", "./app", "app"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("absolute path"));
}

#[test]
fn cli_mount_on_absent_container_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_document(dir.path());
    let source = dir.path().to_string_lossy().into_owned();
    let output = run(dir.path(), &["mount", "web", &source, "/ws"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("does not exist"));
}

#[test]
fn cli_up_unknown_container_fails() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    let output = run(dir.path(), &["up", "ghost"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("not found in config"));
}

#[test]
fn cli_exec_requires_command() {
    let dir = tempfile::tempdir().unwrap();
    write_document(dir.path());
    let output = run(dir.path(), &["exec", "web"]);
    assert_eq!(output.status.code(), Some(2), "clap usage errors exit 2");

    let output = run(dir.path(), &["exec", "web", "--", "ls"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn cli_unknown_backend_fails() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    let output = lxdev_bin(dir.path())
        .env("LXDEV_BACKEND", "docker")
        .arg("list")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("LXDEV_BACKEND"));
}

#[test]
fn cli_delete_removes_document() {
    let dir = tempfile::tempdir().unwrap();
    write_document(dir.path());
    let output = run(dir.path(), &["delete"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!dir.path().join("containers.yaml").exists());
}

#[test]
fn cli_completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("lxdev"));
}

#[test]
fn cli_man_pages_written() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("man");
    let output = run(dir.path(), &["man-pages", &out_dir.to_string_lossy()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(out_dir.join("lxdev.1").exists());
    assert!(out_dir.join("lxdev-mount.1").exists());
}

#[test]
fn cli_verbose_logs_backend_selection() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    let output = run(dir.path(), &["-v", "list"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let err = stderr(&output);
    assert!(err.contains("selected runtime backend"), "stderr: {err}");
    assert!(err.contains("skipping prerequisite check"), "stderr: {err}");

    let output = run(dir.path(), &["list"]);
    assert!(!stderr(&output).contains("selected runtime backend"));
}
