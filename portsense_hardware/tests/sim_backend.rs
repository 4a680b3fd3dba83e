use portsense_hardware::{HwError, RecordingRegistry, RegistryEvent, SimBoard, Wire};
use portsense_traits::{Channel, DeviceHandle, DeviceRegistry, DeviceSpec, Pin, SignalSource};
use rstest::rstest;

fn spec(driver: &str) -> DeviceSpec {
    DeviceSpec {
        driver: driver.to_string(),
        device: "nxt-touch".to_string(),
        port: "in1".to_string(),
        variant: Some("nxt-touch".to_string()),
        probe: Default::default(),
    }
}

#[test]
fn registry_records_register_then_unregister() {
    let shared = RecordingRegistry::new();
    let mut reg = shared.clone();
    let h = reg.register(&spec("nxt-analog-host")).unwrap();
    assert_eq!(shared.live().len(), 1);
    reg.unregister(h).unwrap();
    assert!(shared.live().is_empty());
    assert_eq!(shared.registrations(), 1);
    assert_eq!(shared.unregistrations(), 1);
    assert!(matches!(
        shared.events()[1],
        RegistryEvent::Unregistered { handle, .. } if handle == h
    ));
}

#[test]
fn rejected_driver_fails_with_typed_error() {
    let mut reg = RecordingRegistry::new();
    reg.reject_driver("nxt-i2c-host");
    let err = reg.register(&spec("nxt-i2c-host")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HwError>(),
        Some(HwError::Rejected { .. })
    ));
    reg.accept_driver("nxt-i2c-host");
    assert!(reg.register(&spec("nxt-i2c-host")).is_ok());
}

#[test]
fn unregister_unknown_handle_errors() {
    let mut reg = RecordingRegistry::new();
    assert!(reg.unregister(DeviceHandle(42)).is_err());
}

#[rstest]
#[case(Wire::nxt_touch(false), Pin::P2, false)]
#[case(Wire::nxt_light(), Pin::P5, false)]
#[case(Wire::nxt_i2c(), Pin::P6, true)]
#[case(Wire::EV3_INPUT_EMPTY, Pin::P2, true)]
fn presets_drive_expected_digital_levels(#[case] wire: Wire, #[case] pin: Pin, #[case] level: bool) {
    let mut board = SimBoard::new();
    board.add_port(0, Wire::EV3_INPUT_EMPTY);
    board.plug(0, wire);
    assert_eq!(board.read_digital(0, pin).unwrap(), level);
}

#[test]
fn faulted_port_fails_reads() {
    let mut board = SimBoard::new();
    board.add_port(3, Wire::WEDO_EMPTY);
    board.set_fault(3, true);
    assert!(board.read_voltage(3, Channel::Id).is_err());
    board.set_fault(3, false);
    assert_eq!(board.read_voltage(3, Channel::Id).unwrap(), 230);
}

#[test]
fn unknown_port_is_an_error() {
    let mut board = SimBoard::new();
    let err = board.read_voltage(9, Channel::Pin1).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HwError>(),
        Some(HwError::UnknownPort(9))
    ));
}
