// CLI behaviour: output on success, exit status 2 on rejected transitions

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ticket_flow() -> Command {
    let mut cmd = Command::cargo_bin("ticket-flow").unwrap();
    // Keep the environment from leaking configuration into the run
    cmd.env_remove("TICKET_FLOW_WORKFLOW__DEFINITION_PATH")
        .env("RUST_LOG", "error");
    cmd
}

#[test]
fn test_help_lists_commands() {
    ticket_flow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("actions"))
        .stdout(predicate::str::contains("graph"));
}

#[test]
fn test_check_builtin_workflow() {
    ticket_flow()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("7 statuses"))
        .stdout(predicate::str::contains("10 rules"));
}

#[test]
fn test_resolve_prints_target_status() {
    ticket_flow()
        .args(["resolve", "--status", "RESOLVED", "--action", "CLOSE", "--ticket-type", "REPAIR"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RESOLVED --CLOSE--> CLOSED"))
        .stdout(predicate::str::contains("Customer confirmed the repair"));
}

#[test]
fn test_resolve_json_output() {
    let output = ticket_flow()
        .args(["--json", "resolve", "--status", "open", "--action", "assign", "--ticket-type", "repair"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["to_status"], "ASSIGNED");
    assert_eq!(value["from_status"], "OPEN");
}

#[test]
fn test_terminal_status_exits_with_rejection_code() {
    ticket_flow()
        .args(["resolve", "--status", "CLOSED", "--action", "REOPEN", "--ticket-type", "REPAIR"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("terminal"));
}

#[test]
fn test_unknown_action_exits_with_rejection_code() {
    ticket_flow()
        .args(["resolve", "--status", "OPEN", "--action", "CLOSE", "--ticket-type", "REPAIR"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not defined"));
}

#[test]
fn test_actions_lists_applicable_actions() {
    ticket_flow()
        .args(["actions", "--status", "RESOLVED", "--ticket-type", "REPAIR"])
        .assert()
        .success()
        .stdout(predicate::str::diff("CLOSE\nREOPEN\n"));
}

#[test]
fn test_rules_filtered_by_status() {
    ticket_flow()
        .args(["rules", "--from-status", "ON_HOLD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RESUME"))
        .stdout(predicate::str::contains("2 rule(s)"));
}

#[test]
fn test_graph_marks_terminal_statuses() {
    ticket_flow()
        .args(["graph", "--ticket-type", "REPAIR"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lifecycle REPAIR"))
        .stdout(predicate::str::contains("CLOSED (terminal)"));
}

#[test]
fn test_custom_definition_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("simple.toml");
    std::fs::write(
        &path,
        r#"
[[statuses]]
code = "OPEN"
label = "Open"

[[statuses]]
code = "CLOSED"
label = "Closed"
terminal = true

[[actions]]
code = "CLOSE_ACTION"
label = "Close"

[[ticket_types]]
code = "REPAIR"
label = "Repair"

[[rules]]
from_status = "OPEN"
action = "CLOSE_ACTION"
ticket_type = "REPAIR"
to_status = "CLOSED"
"#,
    )
    .unwrap();

    ticket_flow()
        .arg("--definition")
        .arg(&path)
        .args(["resolve", "--status", "OPEN", "--action", "CLOSE_ACTION", "--ticket-type", "REPAIR"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CLOSED"));
}

#[test]
fn test_invalid_definition_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(
        &path,
        r#"
[[statuses]]
code = "DONE"
label = "Done"
terminal = true

[[actions]]
code = "REDO"
label = "Redo"

[[ticket_types]]
code = "REPAIR"
label = "Repair"

[[rules]]
from_status = "DONE"
action = "REDO"
ticket_type = "REPAIR"
to_status = "DONE"
"#,
    )
    .unwrap();

    ticket_flow()
        .arg("--definition")
        .arg(&path)
        .arg("check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be the source of a rule"));
}

#[test]
fn test_missing_definition_file_is_a_failure() {
    let dir = TempDir::new().unwrap();
    ticket_flow()
        .arg("--definition")
        .arg(dir.path().join("absent.toml"))
        .arg("check")
        .assert()
        .code(1);
}

#[test]
fn test_export_round_trips_builtin_workflow() {
    let dir = TempDir::new().unwrap();
    let output = ticket_flow().arg("export").output().unwrap();
    assert!(output.status.success());

    let path = dir.path().join("exported.toml");
    std::fs::write(&path, &output.stdout).unwrap();
    ticket_flow()
        .arg("--definition")
        .arg(&path)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("10 rules"));
}
