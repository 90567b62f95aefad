//! Integration tests for the baton binary.
//!
//! These run the built tool as a subprocess and inspect what it prints.

use std::io::Write;
use std::process::{Command, Output};

fn baton(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_baton"))
        .args(args)
        .output()
        .expect("failed to run baton")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn processes_take_turns() {
    let output = baton(&["processes", "-n", "2", "--loops", "2"]);
    assert!(output.status.success());

    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().filter(|l| l.starts_with("***")).collect();
    assert_eq!(
        lines,
        [
            "*** Process 0 looped 0 times.",
            "*** Process 1 looped 0 times.",
            "*** Process 0 looped 1 times.",
            "*** Process 1 looped 1 times.",
        ]
    );
    assert!(text.contains("Machine halting!"));
    assert!(text.contains("Ticks: total"));
}

#[test]
fn water_bonds_every_atom() {
    let output = baton(&["water", "-H", "4", "-O", "2"]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert_eq!(text.matches("** Water made! Splash!! **").count(), 2);
    assert_eq!(text.matches("used in making water.").count(), 6);
    assert!(text.contains("Numbers Left: H Atoms: 0, O Atoms: 0"));
}

#[test]
fn water_with_missing_partner_still_halts() {
    let output = baton(&["water", "-H", "3", "-O", "1"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).matches("Splash").count(), 1);
}

#[test]
fn join_reports_exit_code() {
    let output = baton(&["join", "--code", "7", "--steps", "1"]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("join 0: rejected (-1)"));
    assert!(text.contains("join 1: exited with 7"));
    assert!(text.contains("join 1: rejected (-1)"));
}

#[test]
fn json_statistics_on_stdout() {
    let output = baton(&["--json", "processes", "-n", "1", "--loops", "1"]);
    assert!(output.status.success());

    let stats: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    let total = stats["total_ticks"].as_u64().unwrap();
    let system = stats["system_ticks"].as_u64().unwrap();
    let idle = stats["idle_ticks"].as_u64().unwrap();
    let user = stats["user_ticks"].as_u64().unwrap();
    assert!(total > 0);
    assert_eq!(total, system + idle + user);
    assert!(String::from_utf8_lossy(&output.stderr).contains("*** Process 0 looped 0 times."));
}

#[test]
fn config_file_is_read() {
    let dir = std::env::temp_dir().join(format!("baton-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("kernel.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[ticks]\nsystem = 3\nuser = 1").unwrap();
    drop(file);

    let output = baton(&[
        "--json",
        "--config",
        path.to_str().unwrap(),
        "processes",
        "-n",
        "0",
    ]);
    std::fs::remove_dir_all(&dir).ok();
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total_ticks"].as_u64(), Some(3));
}

#[test]
fn bad_config_is_reported() {
    let output = baton(&["--config", "/nonexistent/baton.toml", "processes"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("/nonexistent/baton.toml"));
}
