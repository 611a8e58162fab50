//! CLI tests for rustible-azure
//!
//! This test suite covers:
//! - Subcommand parsing and help output
//! - Module listing and documentation
//! - Usage errors and their exit codes
//! - Config file loading
//! - Ansible binary-module mode, end to end against a mock ARM endpoint

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AZURE_VARS: &[&str] = &[
    "RUSTIBLE_AZURE_CONFIG",
    "AZURE_SUBSCRIPTION_ID",
    "AZURE_TENANT",
    "AZURE_TENANT_ID",
    "AZURE_CLIENT_ID",
    "AZURE_SECRET",
    "AZURE_CLIENT_SECRET",
    "AZURE_ACCESS_TOKEN",
    "AZURE_AUTH_SOURCE",
    "AZURE_RESOURCE_MANAGER_ENDPOINT",
    "RUST_LOG",
];

/// A command isolated from the caller's config files and Azure environment
fn rustible_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("rustible-azure").unwrap();
    cmd.current_dir(home.path()).env("HOME", home.path());
    for var in AZURE_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn write_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

fn stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).unwrap_or_else(|e| panic!("{}: {}", e, stdout))
}

// ============================================================================
// Help and version
// ============================================================================

#[test]
fn test_help() {
    let home = tempdir().unwrap();
    rustible_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Azure Resource Manager"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("ansible"));
}

#[test]
fn test_version() {
    let home = tempdir().unwrap();
    rustible_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_subcommand() {
    let home = tempdir().unwrap();
    rustible_cmd(&home).arg("playbook").assert().failure();
}

// ============================================================================
// list / doc
// ============================================================================

#[test]
fn test_list_modules() {
    let home = tempdir().unwrap();
    rustible_cmd(&home)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("azure_rm_resourcegroup"))
        .stdout(predicate::str::contains("azure_rm_storageaccount"))
        .stdout(predicate::str::contains("azure_rm_resource_info"));
}

#[test]
fn test_list_modules_json() {
    let home = tempdir().unwrap();
    let output = rustible_cmd(&home)
        .args(["--output", "json", "list"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("azure_rm_sqldatabase"), "{}", stdout);
}

#[test]
fn test_doc_shows_parameters() {
    let home = tempdir().unwrap();
    rustible_cmd(&home)
        .args(["doc", "azure_rm_resourcegroup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("location"))
        .stdout(predicate::str::contains("append_tags"));
}

#[test]
fn test_doc_unknown_module() {
    let home = tempdir().unwrap();
    rustible_cmd(&home)
        .args(["doc", "azure_rm_nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("azure_rm_nope"));
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_requires_module() {
    let home = tempdir().unwrap();
    rustible_cmd(&home).arg("run").assert().failure();
}

#[test]
fn test_run_malformed_argument() {
    let home = tempdir().unwrap();
    rustible_cmd(&home)
        .args(["run", "azure_rm_resourcegroup", "-a", "name"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("key=value"));
}

#[test]
fn test_run_missing_required_parameter() {
    let home = tempdir().unwrap();
    rustible_cmd(&home)
        .args(["run", "azure_rm_resourcegroup", "-a", "location=eastus"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("name"));
}

#[test]
fn test_run_invalid_choice() {
    let home = tempdir().unwrap();
    rustible_cmd(&home)
        .args([
            "run",
            "azure_rm_resourcegroup",
            "-a",
            "name=rg1",
            "-a",
            "state=gone",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_run_missing_params_file() {
    let home = tempdir().unwrap();
    rustible_cmd(&home)
        .args(["run", "azure_rm_resourcegroup", "-p", "/nonexistent/params.yml"])
        .assert()
        .code(2);
}

#[test]
fn test_run_error_as_json() {
    let home = tempdir().unwrap();
    let output = rustible_cmd(&home)
        .args(["--output", "json", "run", "azure_rm_nope"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let result = stdout_json(&output);
    assert_eq!(result["failed"], json!(true));
    assert!(result["msg"].as_str().unwrap().contains("azure_rm_nope"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_missing_explicit_config() {
    let home = tempdir().unwrap();
    rustible_cmd(&home)
        .args(["--config", "/nonexistent/azure.toml", "list"])
        .assert()
        .code(2);
}

#[test]
fn test_malformed_config() {
    let home = tempdir().unwrap();
    let config = write_file(".toml", "[azure\nsubscription_id = ");
    rustible_cmd(&home)
        .arg("--config")
        .arg(config.path())
        .arg("list")
        .assert()
        .code(2);
}

#[test]
fn test_config_from_env() {
    let home = tempdir().unwrap();
    let config = write_file(".yml", "azure:\n  subscription_id: from-file\n");
    rustible_cmd(&home)
        .env("RUSTIBLE_AZURE_CONFIG", config.path())
        .arg("list")
        .assert()
        .success();
}

// ============================================================================
// Ansible mode
// ============================================================================

#[test]
fn test_ansible_missing_args_file() {
    let home = tempdir().unwrap();
    let output = rustible_cmd(&home)
        .args(["ansible", "/nonexistent/args.json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let result = stdout_json(&output);
    assert_eq!(result["failed"], json!(true));
    assert_eq!(result["changed"], json!(false));
}

#[test]
fn test_ansible_without_module_name() {
    let home = tempdir().unwrap();
    let args = write_file(".json", r#"{"ANSIBLE_MODULE_ARGS": {"name": "rg1"}}"#);
    let output = rustible_cmd(&home)
        .arg("ansible")
        .arg(args.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let result = stdout_json(&output);
    assert!(result["msg"].as_str().unwrap().contains("--module"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ansible_check_mode_against_mock_arm() {
    let server = MockServer::start().await;
    let group = "/subscriptions/sub-1/resourceGroups/rg1";
    Mock::given(method("GET"))
        .and(path(group))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "ResourceGroupNotFound", "message": "not found"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let home = tempdir().unwrap();
    let args = write_file(
        ".json",
        &json!({
            "ANSIBLE_MODULE_ARGS": {
                "name": "rg1",
                "location": "eastus",
                "subscription_id": "sub-1",
                "_ansible_check_mode": true,
                "_ansible_module_name": "azure_rm_resourcegroup"
            }
        })
        .to_string(),
    );

    let mut cmd = rustible_cmd(&home);
    cmd.env("AZURE_ACCESS_TOKEN", "test-token")
        .env("AZURE_RESOURCE_MANAGER_ENDPOINT", server.uri())
        .arg("ansible")
        .arg(args.path());

    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    let result = stdout_json(&output);
    assert_eq!(result["changed"], json!(true));
    assert_eq!(result["failed"], json!(false));
}

// ============================================================================
// Completions
// ============================================================================

#[test]
fn test_bash_completions() {
    let home = tempdir().unwrap();
    rustible_cmd(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rustible-azure"));
}
