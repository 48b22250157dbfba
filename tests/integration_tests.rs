//! Integration tests for the QCT CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const REFERENCE: &str = "QMS-NC-2025-001";

/// Helper to get a qct command isolated from the user's own config
fn qct(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("qct").unwrap();
    cmd.current_dir(tmp.path())
        .env("QCT_AUTHOR", "tester")
        .env_remove("QCT_ORG")
        .env_remove("QCT_LOG")
        .env("XDG_CONFIG_HOME", tmp.path().join("xdg"))
        .env("HOME", tmp.path());
    cmd
}

/// Helper to create a test project in a temp directory
fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    qct(&tmp).arg("init").assert().success();
    tmp
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Helper to open an NC case raised in 2025; returns its id
fn create_test_case(tmp: &TempDir, title: &str) -> String {
    stdout_of(qct(tmp).args([
        "case",
        "new",
        "--type",
        "nc",
        "--title",
        title,
        "--problem",
        "Bore diameter out of tolerance",
        "--severity",
        "high",
        "--raised-on",
        "2025-02-01",
        "-f",
        "id",
    ]))
}

/// Helper to add a corrective action to a case; returns its id
fn create_test_action(tmp: &TempDir, case: &str, title: &str) -> String {
    stdout_of(qct(tmp).args(["action", "new", case, "--title", title, "-f", "id"]))
}

// ============================================================================
// Init
// ============================================================================

#[test]
fn test_init_creates_project() {
    let tmp = TempDir::new().unwrap();

    qct(&tmp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized QCT project"));

    assert!(tmp.path().join(".qct").is_dir());
    assert!(tmp.path().join(".qct/config.yaml").is_file());
    assert!(tmp.path().join(".qct/qct.db").is_file());
}

#[test]
fn test_init_twice_reports_existing_project() {
    let tmp = setup_test_project();

    qct(&tmp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_command_outside_project_fails() {
    let tmp = TempDir::new().unwrap();

    qct(&tmp).args(["case", "list"]).assert().failure();
}

// ============================================================================
// Cases
// ============================================================================

#[test]
fn test_case_new_assigns_reference() {
    let tmp = setup_test_project();

    qct(&tmp)
        .args([
            "case",
            "new",
            "-T",
            "nc",
            "-t",
            "Housing cracked",
            "-p",
            "Crack found at inspection",
            "--raised-on",
            "2025-02-01",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(REFERENCE));
}

#[test]
fn test_case_references_increment() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "First");
    create_test_case(&tmp, "Second");

    qct(&tmp)
        .args(["case", "list", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("QMS-NC-2025-001"))
        .stdout(predicate::str::contains("QMS-NC-2025-002"));
}

#[test]
fn test_case_list_count_and_filters() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    create_test_case(&tmp, "Wrong label");

    qct(&tmp)
        .args(["case", "list", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("2\n"));

    qct(&tmp)
        .args(["case", "list", "--search", "label", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n"));
}

#[test]
fn test_case_show_json() {
    let tmp = setup_test_project();
    let id = create_test_case(&tmp, "Housing cracked");
    assert!(id.starts_with("CASE-"));

    qct(&tmp)
        .args(["case", "show", REFERENCE, "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reference\": \"QMS-NC-2025-001\""))
        .stdout(predicate::str::contains("\"status\": \"OPEN\""))
        .stdout(predicate::str::contains(id.as_str()));
}

#[test]
fn test_case_show_unknown_reference_fails() {
    let tmp = setup_test_project();

    qct(&tmp)
        .args(["case", "show", "QMS-NC-2025-999"])
        .assert()
        .failure();
}

#[test]
fn test_nc_containment_creates_action() {
    let tmp = setup_test_project();

    qct(&tmp)
        .args([
            "case",
            "new",
            "-T",
            "nc",
            "-t",
            "Contaminated batch",
            "-p",
            "Foreign particles in lot 42",
            "--raised-on",
            "2025-02-01",
            "--containment",
        ])
        .assert()
        .success();

    let ids = stdout_of(qct(&tmp).args(["action", "list", REFERENCE, "-f", "id"]));
    assert_eq!(ids.lines().count(), 1);
    assert!(ids.starts_with("ACT-"));
}

#[test]
fn test_transition_without_actions_fails() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");

    qct(&tmp)
        .args(["case", "transition", REFERENCE, "caip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qct::invalid_transition"));
}

#[test]
fn test_stale_version_is_rejected() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    qct(&tmp)
        .args(["case", "transition", REFERENCE, "investigation"])
        .assert()
        .success();

    qct(&tmp)
        .args([
            "case",
            "transition",
            REFERENCE,
            "open",
            "--expect-version",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qct::conflict"));
}

#[test]
fn test_case_note_and_history() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");

    qct(&tmp)
        .args(["case", "note", REFERENCE, "Supplier contacted"])
        .assert()
        .success();

    qct(&tmp)
        .args(["case", "history", REFERENCE])
        .assert()
        .success()
        .stdout(predicate::str::contains("tester"));
}

// ============================================================================
// Actions and closure
// ============================================================================

#[test]
fn test_close_with_open_action_fails() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    create_test_action(&tmp, REFERENCE, "Re-train operators");

    qct(&tmp)
        .args(["case", "close", REFERENCE])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qct::open_actions_remain"));
}

#[test]
fn test_action_with_unticked_checklist_cannot_be_done() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    let action = stdout_of(qct(&tmp).args([
        "action",
        "new",
        REFERENCE,
        "--title",
        "Update control plan",
        "--check",
        "Draft revision",
        "--check",
        "Sign-off",
        "-f",
        "id",
    ]));

    qct(&tmp)
        .args(["action", "status", &action, "done"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qct::incomplete_checklist"));

    qct(&tmp)
        .args(["action", "check", &action, "0"])
        .assert()
        .success();
    qct(&tmp)
        .args(["action", "check", &action, "1"])
        .assert()
        .success();
    qct(&tmp)
        .args(["action", "status", &action, "done"])
        .assert()
        .success();
}

#[test]
fn test_full_case_lifecycle() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    let action = create_test_action(&tmp, REFERENCE, "Re-train operators");
    assert!(action.starts_with("ACT-"));

    qct(&tmp)
        .args([
            "rca",
            "attach",
            REFERENCE,
            "--why",
            "Operator skipped the gauge check",
            "--why",
            "Work instruction was ambiguous",
            "--root-cause",
            "Work instruction not reviewed after tooling change",
        ])
        .assert()
        .success();

    qct(&tmp)
        .args(["case", "show", REFERENCE, "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("UNDER_INVESTIGATION"));

    qct(&tmp)
        .args(["case", "transition", REFERENCE, "caip"])
        .assert()
        .success();

    qct(&tmp)
        .args(["action", "status", &action, "done"])
        .assert()
        .success();

    qct(&tmp)
        .args(["case", "close", REFERENCE, "-m", "Verified effective"])
        .assert()
        .success();

    qct(&tmp)
        .args(["case", "list", "--status", "closed", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n"));

    // Closed cases are read-only until reopened
    qct(&tmp)
        .args(["case", "note", REFERENCE, "Late remark"])
        .assert()
        .failure();

    qct(&tmp)
        .args(["case", "reopen", REFERENCE, "-r", "Defect recurred"])
        .assert()
        .success();

    qct(&tmp)
        .args(["case", "show", REFERENCE, "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("REOPENED"))
        .stdout(predicate::str::contains("Defect recurred"));
}

// ============================================================================
// Root-cause analysis
// ============================================================================

#[test]
fn test_rca_attach_twice_fails_and_replace_revises() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    let attach = |cmd: &str| {
        qct(&tmp)
            .args([
                "rca",
                cmd,
                REFERENCE,
                "--why",
                "Worn tool",
                "--root-cause",
                "No tool-life limit",
            ])
            .assert()
    };

    attach("attach").success();
    attach("attach")
        .failure()
        .stderr(predicate::str::contains("qct::already_attached"));
    attach("replace").success();

    qct(&tmp)
        .args(["rca", "history", REFERENCE])
        .assert()
        .success()
        .stdout(predicate::str::contains("superseded by"))
        .stdout(predicate::str::contains("current"));
}

#[test]
fn test_rca_without_root_cause_is_incomplete() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");

    qct(&tmp)
        .args(["rca", "attach", REFERENCE, "--why", "Worn tool"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qct::incomplete_analysis"));
}

#[test]
fn test_rca_ishikawa_from_json() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");

    qct(&tmp)
        .args([
            "rca",
            "attach",
            REFERENCE,
            "--method",
            "ishikawa",
            "--json",
            r#"{"machine": ["Worn spindle"], "method": ["No torque spec"]}"#,
            "-c",
            "Spindle wear dominant",
        ])
        .assert()
        .success();

    qct(&tmp)
        .args(["rca", "show", REFERENCE])
        .assert()
        .success()
        .stdout(predicate::str::contains("Worn spindle"))
        .stdout(predicate::str::contains("Spindle wear dominant"));
}

// ============================================================================
// Approvals
// ============================================================================

#[test]
fn test_sequential_approval_blocks_closure_until_signed() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    let action = create_test_action(&tmp, REFERENCE, "Re-train operators");
    qct(&tmp)
        .args(["action", "status", &action, "done"])
        .assert()
        .success();

    let workflow = stdout_of(qct(&tmp).args([
        "approval",
        "create",
        REFERENCE,
        "--signer",
        "user:alice,user:bob",
        "-f",
        "id",
    ]));
    assert!(workflow.starts_with("APV-"));

    qct(&tmp)
        .args(["case", "close", REFERENCE])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qct::approval_incomplete"));

    qct(&tmp)
        .args(["approval", "sign", &workflow, "1", "--by", "bob"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qct::out_of_sequence"));

    qct(&tmp)
        .args(["approval", "sign", &workflow, "0", "--by", "alice"])
        .assert()
        .success();
    qct(&tmp)
        .args(["approval", "sign", &workflow, "0", "--by", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qct::already_signed"));
    qct(&tmp)
        .args(["approval", "sign", &workflow, "1", "--by", "bob"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All steps signed"));

    qct(&tmp)
        .args(["approval", "show", REFERENCE])
        .assert()
        .success()
        .stdout(predicate::str::contains("signed by bob"));

    qct(&tmp)
        .args(["case", "close", REFERENCE])
        .assert()
        .success();
}

#[test]
fn test_role_step_checked_against_roster() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    qct(&tmp)
        .args([
            "team", "add", "--name", "Quinn Lee", "--username", "quinn", "--roles", "quality",
        ])
        .assert()
        .success();

    let workflow = stdout_of(qct(&tmp).args([
        "approval",
        "create",
        REFERENCE,
        "--signer",
        "role:quality",
        "-f",
        "id",
    ]));

    qct(&tmp)
        .args(["approval", "sign", &workflow, "0", "--by", "mallory"])
        .assert()
        .failure();
    qct(&tmp)
        .args(["approval", "sign", &workflow, "0", "--by", "quinn"])
        .assert()
        .success();
}

#[test]
fn test_rejection_leaves_step_unsigned() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    let workflow = stdout_of(qct(&tmp).args([
        "approval",
        "create",
        REFERENCE,
        "--signer",
        "user:alice",
        "-f",
        "id",
    ]));

    qct(&tmp)
        .args([
            "approval",
            "reject",
            &workflow,
            "0",
            "--reason",
            "Evidence missing",
            "--by",
            "alice",
        ])
        .assert()
        .success();

    qct(&tmp)
        .args(["approval", "show", &workflow])
        .assert()
        .success()
        .stdout(predicate::str::contains("pending"))
        .stdout(predicate::str::contains("Evidence missing"));
}

// ============================================================================
// Dashboard, report, export, team
// ============================================================================

#[test]
fn test_status_json_counts_open_cases() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");

    qct(&tmp)
        .args(["status", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"open_cases\": 1"))
        .stdout(predicate::str::contains(REFERENCE));
}

#[test]
fn test_status_shows_overdue_case_as_red() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    create_test_action(&tmp, REFERENCE, "Re-train operators");

    qct(&tmp)
        .args(["status", "--as-of", "2030-01-01", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"health\": \"RED\""));
}

#[test]
fn test_status_case_without_actions_is_green() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");

    qct(&tmp)
        .args(["status", "--as-of", "2030-01-01", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"health\": \"GREEN\""));
}

#[test]
fn test_report_writes_markdown_file() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    let path = tmp.path().join("register.md");

    qct(&tmp)
        .args(["report", "-o", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Report written to"));

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("# Quality Case Register"));
    assert!(content.contains(REFERENCE));
}

#[test]
fn test_export_cases_csv() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");

    qct(&tmp)
        .args(["export", "cases"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("id,reference,type,title"))
        .stdout(predicate::str::contains(REFERENCE));
}

#[test]
fn test_unreadable_roster_blocks_signing() {
    let tmp = setup_test_project();
    create_test_case(&tmp, "Housing cracked");
    let workflow = stdout_of(qct(&tmp).args([
        "approval",
        "create",
        REFERENCE,
        "--signer",
        "role:director",
        "-f",
        "id",
    ]));

    std::fs::write(
        tmp.path().join(".qct/team.yaml"),
        "members:\n  - name: Mal\n    username: mal\n    roles: [mangaer]\n",
    )
    .unwrap();

    qct(&tmp)
        .args(["approval", "sign", &workflow, "0", "--by", "mallory"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qct::config"));
    qct(&tmp)
        .args(["team", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qct::config"));
}

#[test]
fn test_malformed_config_is_reported() {
    let tmp = setup_test_project();
    std::fs::write(
        tmp.path().join(".qct/config.yaml"),
        "require_closure_approval: yes please\n",
    )
    .unwrap();

    qct(&tmp)
        .args(["case", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qct::config"));
}

#[test]
fn test_team_init_add_list() {
    let tmp = setup_test_project();

    qct(&tmp).args(["team", "init"]).assert().success();
    qct(&tmp).args(["team", "init"]).assert().failure();

    qct(&tmp)
        .args([
            "team",
            "add",
            "--name",
            "Jane Smith",
            "--username",
            "jsmith",
            "--roles",
            "quality,manager",
        ])
        .assert()
        .success();

    qct(&tmp)
        .args(["team", "list", "--role", "manager"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jsmith"));
}

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();

    qct(&tmp)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("qct"));
}
