#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_scenario-tester") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "scenario-tester.exe"
    } else {
        "scenario-tester"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve scenario-tester binary path for integration test"),
    }
}

/// Run the binary in `cwd` with extra environment, logging the invocation.
pub fn run_cli_case_in(case_name: &str, cwd: &Path, env: &[(&str, &str)], args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("scenario-tester-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .current_dir(cwd)
        .env("RUST_BACKTRACE", "1")
        .env_remove("SCENARIO_TESTER_ACTIVITY_LOG")
        .env_remove("SCENARIO_TESTER_VERBOSE");
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().expect("execute scenario-tester command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("cwd={}\n", cwd.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

pub fn run_cli_case(case_name: &str, cwd: &Path, args: &[&str]) -> CmdResult {
    run_cli_case_in(case_name, cwd, &[], args)
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
    fs::write(path, contents).expect("write fixture file");
}

/// Install a package under `<root>/node_modules/<dir_name>`.
pub fn install_package(root: &Path, dir_name: &str, version: &str, has_bye: bool) {
    let pkg = root.join("node_modules").join(dir_name);
    write(
        &pkg.join("package.json"),
        &format!("{{\"name\":\"hello\",\"version\":\"{version}\",\"main\":\"index.js\"}}\n"),
    );
    let bye = if has_bye {
        "  bye() { return `Goodbye ${this.name}!`; }\n"
    } else {
        ""
    };
    write(
        &pkg.join("index.js"),
        &format!(
            "module.exports = class Hello {{\n  constructor(name) {{ this.name = name; }}\n  hi() {{ return `Hello ${{this.name}}!`; }}\n{bye}}};\n"
        ),
    );
}

/// Lay out a suite below `root`:
///
/// - `fixtures/app`: an app depending on `hello`
/// - `fixtures/node_modules/hello` (2.0.0, has `bye`) and `hello1` (1.0.0, no `bye`)
/// - `tests/app-test.toml`: hello1 / hello2 / skipMe (skipped twice)
/// - `tests/skip-test.toml`: inline project, variant-one / variant-two mapped
pub fn build_suite(root: &Path) {
    let fixtures = root.join("fixtures");
    write(
        &fixtures.join("app/package.json"),
        r#"{"name":"app","version":"1.0.0","scripts":{"test":"node test.js"},"dependencies":{"hello":"*"}}"#,
    );
    write(
        &fixtures.join("app/index.js"),
        "const Hello = require('hello');\nmodule.exports = (name) => new Hello(name);\n",
    );
    write(&fixtures.join("app/lib/util.js"), "module.exports = {};\n");
    install_package(&fixtures, "hello", "2.0.0", true);
    install_package(&fixtures, "hello1", "1.0.0", false);

    write(
        &root.join("tests/app-test.toml"),
        r#"skip = ["skipMe", "skipMe"]

[base]
dir = "../fixtures/app"

[[variants]]
name = "hello1"
steps = [{ op = "link_dependency", name = "hello", base_dir = "../fixtures", resolve_name = "hello1" }]

[[variants]]
name = "hello2"
steps = [{ op = "link_dependency", name = "hello", base_dir = "../fixtures", resolve_name = "hello" }]

[[variants]]
name = "skipMe"
"#,
    );
    write(
        &root.join("tests/skip-test.toml"),
        r#"[base.project]
name = "skip-tester"

[[variants]]
name = "variant-one"

[[variants]]
name = "variant-two"

[[map]]
name = "not-skipped"
"#,
    );
}
