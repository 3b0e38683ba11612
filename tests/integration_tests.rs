//! Integration tests: CLI smoke tests and list / output against a fixture suite.

mod common;

use std::fs;

use serde_json::Value;
use tempfile::TempDir;

fn suite() -> TempDir {
    let tmp = TempDir::new().expect("tempdir");
    common::build_suite(tmp.path());
    tmp
}

#[test]
fn help_command_prints_usage() {
    let tmp = TempDir::new().unwrap();
    let result = common::run_cli_case("help_command_prints_usage", tmp.path(), &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result
            .stdout
            .contains("Usage: scenario-tester [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let tmp = TempDir::new().unwrap();
    let result = common::run_cli_case("version_command_prints_version", tmp.path(), &["--version"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(
        result.stdout.contains("scenario-tester"),
        "missing version output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn subcommand_help_flags_work() {
    let tmp = TempDir::new().unwrap();
    for sub in ["list", "output", "completions"] {
        let result = common::run_cli_case(&format!("help_{sub}"), tmp.path(), &[sub, "--help"]);
        assert!(
            result.status.success(),
            "{sub} --help failed; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn list_prints_names_in_order() {
    let tmp = suite();
    let result = common::run_cli_case(
        "list_prints_names_in_order",
        tmp.path(),
        &["list", "--files", "tests/*-test.toml"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let names: Vec<&str> = result.stdout.lines().collect();
    assert_eq!(
        names,
        vec![
            "hello1",
            "hello2",
            "variant-one-not-skipped",
            "variant-two-not-skipped"
        ],
        "log: {}",
        result.log_path.display()
    );
}

#[test]
fn list_with_require_loads_required_first() {
    let tmp = suite();
    let result = common::run_cli_case(
        "list_with_require_loads_required_first",
        tmp.path(),
        &[
            "list",
            "--require",
            "tests/skip-test.toml",
            "--files",
            "tests/*-test.toml",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let names: Vec<&str> = result.stdout.lines().collect();
    assert_eq!(
        names,
        vec![
            "variant-one-not-skipped",
            "variant-two-not-skipped",
            "hello1",
            "hello2"
        ]
    );
}

#[test]
fn list_matrix_emits_job_matrix_json() {
    let tmp = suite();
    let result = common::run_cli_case(
        "list_matrix_emits_job_matrix_json",
        tmp.path(),
        &[
            "list",
            "--files",
            "tests/app-test.toml",
            "--matrix",
            "npm run test:scenario -- --filter %s",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let value: Value = serde_json::from_str(&result.stdout).unwrap_or_else(|e| {
        panic!("invalid json ({e}); log: {}", result.log_path.display())
    });
    assert_eq!(value["name"], serde_json::json!(["hello1", "hello2"]));
    assert_eq!(value["include"][0]["name"], "hello1");
    assert_eq!(
        value["include"][1]["command"],
        "npm run test:scenario -- --filter hello2"
    );
}

#[test]
fn list_requires_a_source() {
    let tmp = suite();
    let result = common::run_cli_case("list_requires_a_source", tmp.path(), &["list"]);
    assert!(!result.status.success());
}

#[test]
fn list_with_missing_require_fails_as_runtime_error() {
    let tmp = suite();
    let result = common::run_cli_case(
        "list_with_missing_require",
        tmp.path(),
        &["list", "--require", "nope.toml"],
    );
    assert_eq!(result.status.code(), Some(2), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("ST-3002"));
}

#[test]
fn list_with_broken_manifest_is_user_error() {
    let tmp = suite();
    fs::write(tmp.path().join("tests/broken-test.toml"), "[base]\n").unwrap();
    let result = common::run_cli_case(
        "list_with_broken_manifest",
        tmp.path(),
        &["list", "--files", "tests/broken-test.toml"],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("ST-2201"));
}

#[test]
fn output_writes_matching_scenario() {
    let tmp = suite();
    let result = common::run_cli_case(
        "output_writes_matching_scenario",
        tmp.path(),
        &[
            "--no-color",
            "output",
            "--files",
            "tests/*-test.toml",
            "--scenario",
            "hello1",
            "--outdir",
            "out",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.contains("Found scenario hello1"));
    assert!(result.stdout.contains("Wrote successfully to out"));

    let out = tmp.path().join("out");
    assert!(out.join("index.js").exists());
    assert!(out.join("lib/util.js").exists());
    let pkg: Value =
        serde_json::from_str(&fs::read_to_string(out.join("package.json")).unwrap()).unwrap();
    assert_eq!(pkg["name"], "app");
    let linked = fs::read_to_string(out.join("node_modules/hello/package.json")).unwrap();
    assert!(linked.contains("\"1.0.0\""), "hello should resolve to hello1");
}

#[test]
fn output_without_match_exits_with_user_error() {
    let tmp = suite();
    let result = common::run_cli_case(
        "output_without_match",
        tmp.path(),
        &[
            "output",
            "--files",
            "tests/*-test.toml",
            "--scenario",
            "nothing-like-this",
            "--outdir",
            "out",
        ],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(
        result
            .stderr
            .contains("Try running \"scenario-tester list\" to see all available scenarios.")
    );
    assert!(!tmp.path().join("out").exists());
}

#[test]
fn explicit_missing_config_is_user_error() {
    let tmp = suite();
    let result = common::run_cli_case(
        "explicit_missing_config",
        tmp.path(),
        &["--config", "missing.toml", "list", "--files", "tests/*.toml"],
    );
    assert_eq!(result.status.code(), Some(1));
    assert!(result.stderr.contains("ST-1002"));
}

#[test]
fn activity_log_records_listing_and_prepare() {
    let tmp = suite();
    let log = tmp.path().join("activity.jsonl");
    let log_str = log.to_string_lossy().to_string();
    let result = common::run_cli_case_in(
        "activity_log_records_listing_and_prepare",
        tmp.path(),
        &[("SCENARIO_TESTER_ACTIVITY_LOG", log_str.as_str())],
        &[
            "output",
            "--files",
            "tests/app-test.toml",
            "--scenario",
            "hello2",
            "--outdir",
            "out",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let events: Vec<String> = fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(|line| {
            let v: Value = serde_json::from_str(line).unwrap();
            v["event"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        events,
        vec!["scenarios_listed", "scenario_prepared", "scenario_written"]
    );
}

#[test]
fn config_file_in_cwd_is_picked_up() {
    let tmp = suite();
    fs::write(
        tmp.path().join("scenario-tester.toml"),
        "[logging]\nverbose = true\n",
    )
    .unwrap();
    let result = common::run_cli_case(
        "config_file_in_cwd_is_picked_up",
        tmp.path(),
        &["list", "--files", "tests/app-test.toml"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("[ST] config:"));
    assert!(result.stderr.contains("listed 2 scenario(s)"));
}

#[test]
fn completions_generate_script() {
    let tmp = TempDir::new().unwrap();
    let result = common::run_cli_case("completions_bash", tmp.path(), &["completions", "bash"]);
    assert!(result.status.success());
    assert!(result.stdout.contains("scenario-tester"));
}
