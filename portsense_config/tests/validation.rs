use portsense_config::{PortKind, load_toml};
use rstest::rstest;

const PORTS: &str = r#"
[[ports]]
name = "in1"
kind = "ev3-input"
index = 0

[[ports]]
name = "outA"
kind = "ev3-output"
index = 4
mode = "ev3-tacho-motor"
"#;

#[test]
fn minimal_config_uses_defaults() {
    let cfg = load_toml(PORTS).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.timing.poll_ms, 10);
    assert_eq!(cfg.timing.settle_ticks, 2);
    assert!(cfg.timing.add_ticks < cfg.timing.remove_ticks);
    assert_eq!(cfg.dispatcher.nxt_i2c_boot_ms, 1000);
    assert_eq!(cfg.ports[0].mode, "auto");
    assert_eq!(cfg.ports[1].kind, PortKind::Ev3Output);
}

#[rstest]
#[case("[timing]\npoll_ms = 0\n", "poll_ms must be >= 1")]
#[case("[timing]\nsettle_ticks = 0\n", "settle_ticks must be >= 1")]
#[case("[timing]\nadd_ticks = 0\n", "add_ticks must be >= 1")]
#[case("[timing]\nremove_ticks = 0\n", "remove_ticks must be >= 1")]
#[case("[timing]\nsettle_ticks = 5\nadd_ticks = 5\n", "settle_ticks must be < timing.add_ticks")]
#[case("[dispatcher]\nqueue_depth = 0\n", "queue_depth must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"\n", "rotation must be one of")]
fn rejects_out_of_range_values(#[case] head: &str, #[case] needle: &str) {
    let text = format!("{head}{PORTS}");
    let cfg = load_toml(&text).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        err.to_string().contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[test]
fn rejects_duplicate_names_and_slots() {
    let dup_name = r#"
[[ports]]
name = "in1"
kind = "ev3-input"
index = 0

[[ports]]
name = "in1"
kind = "ev3-input"
index = 1
"#;
    let err = load_toml(dup_name).unwrap().validate().unwrap_err();
    assert!(err.to_string().contains("used more than once"));

    let dup_slot = r#"
[[ports]]
name = "in1"
kind = "ev3-input"
index = 2

[[ports]]
name = "hub1"
kind = "wedo"
index = 2
"#;
    let err = load_toml(dup_slot).unwrap().validate().unwrap_err();
    assert!(err.to_string().contains("ports.index 2"));
}

#[test]
fn rejects_empty_port_list() {
    let cfg = load_toml("ports = []\n").unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("at least one port"));
}

#[test]
fn unknown_kind_fails_to_parse() {
    let text = r#"
[[ports]]
name = "x"
kind = "usb-hub"
index = 0
"#;
    assert!(load_toml(text).is_err());
}

#[test]
fn multiplexer_kinds_parse() {
    let text = r#"
[[ports]]
name = "hs1"
kind = "ht-smux"
index = 0
mode = "i2c"

[[ports]]
name = "ms1"
kind = "ms-ev3-smux"
index = 1
"#;
    let cfg = load_toml(text).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.ports[0].kind, PortKind::HtSmux);
    assert_eq!(cfg.ports[1].kind, PortKind::MsEv3Smux);
    assert_eq!(cfg.ports[1].mode, "auto");
}
