//! Integration tests for the `wls` binary.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::{NamedTempFile, TempDir};

/// A temp home with a config file pointing at a temp database.
struct Sandbox {
    home: TempDir,
    config: NamedTempFile,
}

impl Sandbox {
    fn new() -> Self {
        let home = TempDir::new().unwrap();
        let db_path = home.path().join("wls.db");

        let mut config = NamedTempFile::new().unwrap();
        writeln!(config, r#"database_path = "{}""#, db_path.display()).unwrap();
        config.flush().unwrap();

        Self { home, config }
    }

    fn run(&self, args: &[&str]) -> Output {
        isolated(Command::new(env!("CARGO_BIN_EXE_wls")), self.home.path())
            .arg("--config")
            .arg(self.config.path())
            .args(args)
            .output()
            .expect("failed to run wls")
    }
}

fn isolated(mut command: Command, home: &Path) -> Command {
    for (key, _) in std::env::vars() {
        if key.starts_with("WLS_") {
            command.env_remove(key);
        }
    }
    command
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_DATA_HOME", home.join(".local/share"))
        .env_remove("RUST_LOG");
    command
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn help_lists_commands() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["--help"]);
    assert!(output.status.success());

    let help = stdout(&output);
    for command in ["export", "push", "mapping", "status"] {
        assert!(help.contains(command), "help should list {command}: {help}");
    }
}

#[test]
fn mapping_round_trip() {
    let sandbox = Sandbox::new();

    let output = sandbox.run(&[
        "mapping",
        "add",
        "Project Alpha",
        "--task",
        "Development",
        "--project-id",
        "10",
        "--task-id",
        "24",
    ]);
    assert!(output.status.success(), "add failed: {}", stderr(&output));

    let output = sandbox.run(&["mapping", "add", "Lunch", "--skip"]);
    assert!(output.status.success(), "add failed: {}", stderr(&output));

    let output = sandbox.run(&["mapping", "list"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "Project Alpha:Development -> project 10 / task 24\nLunch -> skip\n"
    );

    let output = sandbox.run(&["mapping", "remove", "Lunch"]);
    assert!(output.status.success(), "remove failed: {}", stderr(&output));

    let output = sandbox.run(&["mapping", "list", "--json"]);
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        entries,
        serde_json::json!([{
            "source_project": "Project Alpha",
            "source_task": "Development",
            "action": "map",
            "project_id": 10,
            "task_id": 24
        }])
    );
}

#[test]
fn status_on_fresh_database() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["status"]);
    assert!(output.status.success(), "status failed: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.starts_with("Work log sync status\n"));
    assert!(text.contains("Mappings: 0"));
    assert!(text.contains("Last sync: never"));
}

#[test]
fn export_requires_mappings() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["export", "--from", "2026-02-01", "--to", "2026-02-28"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no mappings configured"));
}

#[test]
fn push_requires_api_key() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["push", "--dry-run"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("missing Clockify API key"));
}
