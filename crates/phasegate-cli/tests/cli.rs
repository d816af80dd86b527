use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::tempdir;

fn phasegate(repo: &Path, args: &[&str], stdin: Option<&str>) -> Output {
    phasegate_bytes(repo, args, stdin.unwrap_or("").as_bytes())
}

fn phasegate_bytes(repo: &Path, args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_phasegate"))
        .arg("--repo")
        .arg(repo)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    {
        let mut input = child.stdin.take().unwrap();
        input.write_all(stdin).unwrap();
    }
    child.wait_with_output().unwrap()
}

#[test]
fn check_blocks_coding_on_main_without_stdout() {
    let dir = tempdir().unwrap();
    assert!(phasegate(dir.path(), &["init"], None).status.success());

    let out = phasegate(
        dir.path(),
        &["check", "--text", "implement the login feature", "--branch", "main"],
        None,
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("protected-branch-coding"), "{err}");
}

#[test]
fn check_reads_hook_payload_from_stdin() {
    let dir = tempdir().unwrap();
    let allowed = phasegate(
        dir.path(),
        &["check", "--branch", "feature/x"],
        Some(r#"{"prompt":"继续讨论设计"}"#),
    );
    assert_eq!(allowed.status.code(), Some(0));
    assert!(allowed.stdout.is_empty());

    let blocked = phasegate(
        dir.path(),
        &["check", "--branch", "feature/x"],
        Some(r#"{"prompt":"继续写代码"}"#),
    );
    assert_eq!(blocked.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&blocked.stderr).contains("continuation-bypass"));
}

#[test]
fn task_lifecycle_exit_codes() {
    let dir = tempdir().unwrap();
    assert!(phasegate(dir.path(), &["start", "login form", "feature/x"], None).status.success());

    let again = phasegate(dir.path(), &["start", "other", "feature/y"], None);
    assert_eq!(again.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&again.stderr).contains("phasegate complete"));

    let wrong = phasegate(dir.path(), &["check", "--text", "hello", "--branch", "feature/y"], None);
    assert_eq!(wrong.status.code(), Some(1));

    let cancel = phasegate(dir.path(), &["cancel"], None);
    assert!(cancel.status.success());
    assert!(String::from_utf8_lossy(&cancel.stderr).contains("EMERGENCY BYPASS"));

    let complete = phasegate(dir.path(), &["complete"], None);
    assert!(complete.status.success());
    assert!(String::from_utf8_lossy(&complete.stderr).contains("no active task"));
}

#[test]
fn phase_set_rejects_skips_unless_forced() {
    let dir = tempdir().unwrap();
    assert_eq!(phasegate(dir.path(), &["phase", "set", "P3"], None).status.code(), Some(1));
    assert!(phasegate(dir.path(), &["phase", "set", "testing", "--force"], None).status.success());
    let show = phasegate(dir.path(), &["phase", "show"], None);
    assert!(String::from_utf8_lossy(&show.stdout).contains("P3 (testing)"));

    let advance = phasegate(dir.path(), &["phase", "advance"], None);
    assert_eq!(advance.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&advance.stderr).contains("test-files"));
}

fn write_config(repo: &Path, body: &str) {
    let dir = repo.join(".phasegate");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("phasegate.toml"), body).unwrap();
}

#[test]
fn check_fails_closed_when_configured_and_engine_cannot_open() {
    let dir = tempdir().unwrap();
    write_config(
        dir.path(),
        "[workflow]\nfail_mode = \"closed\"\n\n[detector]\nrules_file = \"missing.yaml\"\n",
    );
    let out = phasegate(
        dir.path(),
        &["check", "--text", "implement the login feature", "--branch", "main"],
        None,
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("missing.yaml"), "{err}");
    assert!(err.contains("->"), "{err}");
}

#[test]
fn check_fails_open_by_default_when_engine_cannot_open() {
    let dir = tempdir().unwrap();
    write_config(dir.path(), "[detector]\nrules_file = \"missing.yaml\"\n");
    let out = phasegate(dir.path(), &["check", "--text", "hello", "--branch", "main"], None);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stderr).contains("allowing"));
}

#[test]
fn check_tolerates_non_utf8_stdin() {
    let dir = tempdir().unwrap();
    let out = phasegate_bytes(dir.path(), &["check", "--branch", "feature/x"], b"hello \xff\xfe world");
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
}

#[test]
fn doctor_reports_corrupt_config_as_a_failed_check() {
    let dir = tempdir().unwrap();
    assert!(phasegate(dir.path(), &["init"], None).status.success());
    write_config(dir.path(), "[workflow\n");

    let out = phasegate(dir.path(), &["doctor"], None);
    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("[FAIL] config"), "{stdout}");
    assert!(stdout.contains("[ok] phase"), "{stdout}");
    assert!(stdout.contains("[ok] rules"), "{stdout}");
}

#[test]
fn rules_test_names_the_blocking_rule() {
    let dir = tempdir().unwrap();
    let out = phasegate(dir.path(), &["rules", "--test", "implement the login feature", "--branch", "main"], None);
    assert_eq!(out.status.code(), Some(1));
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("PB-001"), "{err}");

    let out = phasegate(dir.path(), &["rules", "--test", "review the code", "--branch", "main"], None);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("no blocking rule matched"));
}
