mod common;

use common::Project;
use predicates::prelude::*;
use predicates::str::contains;

const SHELL: &str = r#"
preset = "shell"
roots = ["<rootDir>/src", "<rootDir>/tests"]
test_path_ignore_patterns = ["/node_modules/", "/dist/", "<rootDir>/src/oss/tests/"]
"#;

#[test]
fn runs_matching_files_and_reports_success() {
    let project = Project::new(SHELL);
    project.file("src/memory.test.sh", "echo 'ok 1 - add'\necho 'ok 2 - search'\n");
    project.file("tests/__tests__/graph.sh", "true\n");
    project.file("src/helpers.sh", "exit 1\n");

    project
        .cmd()
        .arg("run")
        .assert()
        .success()
        .stdout(contains("PASS src/memory.test.sh"))
        .stdout(contains("PASS tests/__tests__/graph.sh"))
        .stdout(contains("Tests:      0 failed, 3 passed, 0 skipped, 3 total"))
        .stdout(contains("helpers").not());
}

#[test]
fn ignored_files_never_run_even_when_they_match() {
    let project = Project::new(SHELL);
    project.file("src/ok.test.sh", "true\n");
    project.file("src/oss/tests/drift.test.sh", "touch oss-ran\nexit 1\n");
    project.file("src/node_modules/dep/dep.test.sh", "touch dep-ran\nexit 1\n");

    project
        .cmd()
        .arg("run")
        .assert()
        .success()
        .stdout(contains("drift").not())
        .stdout(contains("Test files: 0 failed, 1 passed, 0 skipped, 1 total"));

    assert!(!project.exists("oss-ran"));
    assert!(!project.exists("dep-ran"));
}

#[test]
fn failing_file_does_not_stop_siblings() {
    let project = Project::new(SHELL);
    project.file("src/a.test.sh", "echo 'not ok 1 - persists'\n");
    project.file("src/b.test.sh", "touch b-ran\n");
    project.file("src/c.test.sh", "exit 77\n");

    project
        .cmd()
        .args(["run", "--jobs", "1"])
        .assert()
        .code(1)
        .stdout(contains("FAIL src/a.test.sh"))
        .stdout(contains("failed: persists"))
        .stdout(contains("PASS src/b.test.sh"))
        .stdout(contains("SKIP src/c.test.sh"));

    assert!(project.exists("b-ran"));
}

#[test]
fn empty_suite_passes_when_allowed() {
    let project = Project::new(&format!("{}pass_with_no_tests = true\n", SHELL));
    project.file("src/lib.sh", "true\n");

    project
        .cmd()
        .arg("run")
        .assert()
        .success()
        .stdout(contains("0 total"));
}

#[test]
fn empty_suite_fails_by_default() {
    let project = Project::new(SHELL);
    project.file("src/lib.sh", "true\n");

    project
        .cmd()
        .arg("run")
        .assert()
        .code(1)
        .stderr(contains("no tests found"));
}

#[test]
fn cli_flag_allows_empty_suite() {
    let project = Project::new(SHELL);

    project
        .cmd()
        .args(["run", "--pass-with-no-tests"])
        .assert()
        .success();
}

#[test]
fn path_filter_that_matches_nothing_is_an_empty_suite() {
    let project = Project::new(SHELL);
    project.file("src/a.test.sh", "true\n");

    project.cmd().args(["run", "nomatch"]).assert().code(1);
    project
        .cmd()
        .args(["run", "a.test"])
        .assert()
        .success()
        .stdout(contains("PASS src/a.test.sh"));
}

#[test]
fn setup_failure_aborts_before_any_test() {
    let project = Project::new(&format!(
        "{}setup_files = [\"./setup/first\", \"./setup/second\"]\n",
        SHELL
    ));
    project.file("setup/first.sh", "touch first-done\n");
    project.file("setup/second.sh", "echo 'cannot seed' >&2\nexit 1\n");
    project.file("src/a.test.sh", "touch test-ran\n");

    project
        .cmd()
        .arg("run")
        .assert()
        .code(2)
        .stderr(contains("setup script"))
        .stderr(contains("cannot seed"));

    assert!(project.exists("first-done"));
    assert!(!project.exists("test-ran"));
}

#[test]
fn setup_runs_once_in_order_before_tests() {
    let project = Project::new(&format!(
        "{}setup_files = [\"./setup/first.sh\", \"./setup/second.sh\"]\n",
        SHELL
    ));
    project.file("setup/first.sh", "echo first >> setup.log\n");
    project.file("setup/second.sh", "echo second >> setup.log\n");
    project.file("src/a.test.sh", "[ \"$(cat setup.log)\" = \"$(printf 'first\\nsecond')\" ]\n");
    project.file("src/b.test.sh", "[ -f setup.log ]\n");

    project.cmd().arg("run").assert().success();

    let log = std::fs::read_to_string(project.root().join("setup.log")).unwrap();
    assert_eq!(log, "first\nsecond\n");
}

#[test]
fn transform_runs_before_execution() {
    let project = Project::new(
        r#"
test_environment = "shell"
test_match = ["**/*.test.tsh"]

[[transform]]
pattern = "**/*.tsh"
tool = "./tools/strip.sh"
output_extension = "sh"

[globals."./tools/strip.sh"]
config = "<rootDir>/tsconfig.test.json"
args = ["{input}", "{output}"]
"#,
    );
    project.file("tsconfig.test.json", "{ \"compilerOptions\": { \"strict\": true } }");
    let tool = project.file(
        "tools/strip.sh",
        "#!/bin/sh\n\
         [ -n \"$HARNESS_TRANSFORM_CONFIG\" ] || exit 9\n\
         sed 's/: string//g' \"$1\" > \"$2\"\n",
    );
    make_executable(&tool);
    project.file("src/typed.test.tsh", "name: string=memory\n[ \"$name\" = memory ]\n");

    project
        .cmd()
        .arg("run")
        .assert()
        .success()
        .stdout(contains("PASS src/typed.test.tsh"));

    assert!(project.exists(".harness-cache/src/typed.test.tsh.sh"));
}

#[test]
fn json_report() {
    let project = Project::new(SHELL);
    project.file("src/a.test.sh", "true\n");

    let output = project.cmd().args(["run", "--json"]).output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["success"], true);
    assert_eq!(report["files"][0]["path"], "src/a.test.sh");
    assert_eq!(report["files"][0]["status"], "passed");
}

#[cfg(unix)]
fn make_executable(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &std::path::Path) {}
