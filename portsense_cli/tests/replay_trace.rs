use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[dispatcher]
nxt_i2c_boot_ms = 0

[[ports]]
name = "in1"
kind = "ev3-input"
index = 0

[[ports]]
name = "hub"
kind = "wedo"
index = 1
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn write_trace(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("trace.csv");
    fs::write(&path, body).unwrap();
    path
}

fn replay_json(cfg: &PathBuf, trace: &PathBuf) -> Vec<serde_json::Value> {
    let mut cmd = Command::cargo_bin("portsense").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(cfg)
        .arg("replay")
        .arg("--trace")
        .arg(trace);
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8_lossy(&out)
        .lines()
        .map(|l| serde_json::from_str(l).expect("every stdout line is JSON"))
        .collect()
}

#[rstest]
fn replay_attaches_touch_sensor_and_tilt_once() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    // in1: touch sensor from tick 5; hub: tilt id from tick 3
    let trace = write_trace(
        &dir,
        "tick,port,pin1_mv,pin5_mv,pin6_mv,pin2,pin5,pin6,id\n\
         0,0,5000,0,0,1,1,0,0\n\
         0,1,0,2500,0,0,0,0,230\n\
         3,1,0,2500,0,0,0,0,35\n\
         5,0,417,0,0,1,1,0,0\n",
    );

    let lines = replay_json(&cfg, &trace);
    let attached: Vec<_> = lines
        .iter()
        .filter(|v| v["event"] == "attached")
        .collect();
    assert_eq!(attached.len(), 2, "lines: {lines:?}");
    let in1 = attached.iter().find(|v| v["port"] == "in1").unwrap();
    assert_eq!(in1["device"], "ev3-touch");
    // add_ticks (10) of stable signal after the plug at tick 5
    assert!(in1["tick"].as_u64().unwrap() >= 15);
    let hub = attached.iter().find(|v| v["port"] == "hub").unwrap();
    assert_eq!(hub["device"], "tilt");

    let statuses: Vec<_> = lines.iter().filter_map(|v| v.get("status")).collect();
    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(|s| s["attached"] == true));
}

#[rstest]
fn replay_short_dropout_does_not_detach() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    // Touch sensor pulled for 10 ticks, well under remove_ticks (35)
    let trace = write_trace(
        &dir,
        "tick,port,pin1_mv,pin5_mv,pin6_mv,pin2,pin5,pin6,id\n\
         0,0,417,0,0,1,1,0,0\n\
         30,0,5000,0,0,1,1,0,0\n\
         40,0,417,0,0,1,1,0,0\n",
    );
    let lines = replay_json(&cfg, &trace);
    assert_eq!(lines.iter().filter(|v| v["event"] == "attached").count(), 1);
    assert_eq!(lines.iter().filter(|v| v["event"] == "detached").count(), 0);
}

#[test]
fn replay_reports_bad_trace_header() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let trace = write_trace(&dir, "tick,port,mv\n0,0,5000\n");

    let mut cmd = Command::cargo_bin("portsense").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("replay")
        .arg("--trace")
        .arg(&trace);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[test]
fn replay_text_output_lists_events_and_table() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let trace = write_trace(
        &dir,
        "tick,port,pin1_mv,pin5_mv,pin6_mv,pin2,pin5,pin6,id\n\
         0,0,30,0,0,1,1,0,0\n",
    );
    let mut cmd = Command::cargo_bin("portsense").unwrap();
    cmd.arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("replay")
        .arg("--trace")
        .arg(&trace);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("attached ev3-uart"))
        .stdout(predicate::str::contains("PORT"));
}
