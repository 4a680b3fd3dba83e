//! End-to-end classification across the detecting port families.

use portsense_core::{
    ConnectionState, DeviceType, DispatcherCfg, PortError, PortEvent, PortKind, PortManager,
    PortSpec, Probe, Settings, Timing,
};
use portsense_hardware::registry::RecordingRegistry;
use portsense_hardware::sim::{SimBoard, Wire};
use portsense_traits::clock::MonotonicClock;
use portsense_traits::{Direction, Pin};
use rstest::rstest;
use std::time::Duration;

fn settings() -> Settings {
    Settings {
        timing: Timing {
            poll: Duration::from_millis(1),
            settle_ticks: 2,
            add_ticks: 10,
            remove_ticks: 35,
        },
        dispatcher: DispatcherCfg {
            queue_depth: 8,
            nxt_i2c_boot: Duration::ZERO,
        },
    }
}

fn rig(kind: PortKind, baseline: Wire) -> (SimBoard, RecordingRegistry, PortManager<SimBoard>) {
    let board = SimBoard::new();
    board.add_port(3, baseline);
    let registry = RecordingRegistry::new();
    let mut mgr = PortManager::new(board.clone(), registry.clone(), MonotonicClock::new(), &settings());
    mgr.add_port(&PortSpec::new("p", kind, 3)).unwrap();
    (board, registry, mgr)
}

fn run(mgr: &mut PortManager<SimBoard>, n: usize) -> Vec<PortEvent> {
    let mut events = Vec::new();
    for _ in 0..n {
        events.extend(mgr.tick());
        events.extend(mgr.wait_idle(Duration::from_secs(2)));
    }
    events
}

fn classified(events: &[PortEvent]) -> Vec<DeviceType> {
    events
        .iter()
        .filter_map(|e| match e {
            PortEvent::Classified { device, .. } => Some(*device),
            _ => None,
        })
        .collect()
}

#[rstest]
#[case::nxt_touch_released(Wire::nxt_touch(false), DeviceType::NxtTouch)]
#[case::nxt_touch_pressed(Wire::nxt_touch(true), DeviceType::NxtTouch)]
#[case::nxt_light(Wire::nxt_light(), DeviceType::NxtLight)]
#[case::nxt_analog(Wire::nxt_analog(3000), DeviceType::NxtAnalog)]
#[case::nxt_color(Wire::nxt_color(), DeviceType::NxtColor)]
#[case::nxt_i2c(Wire::nxt_i2c(), DeviceType::NxtI2c)]
#[case::ev3_touch(Wire::ev3_touch(), DeviceType::Ev3Touch)]
#[case::ev3_uart(Wire::ev3_uart(), DeviceType::Ev3Uart)]
#[case::ev3_analog(Wire::ev3_analog(1400), DeviceType::Ev3Analog(7))]
fn ev3_input_devices(#[case] wire: Wire, #[case] expected: DeviceType) {
    let (board, registry, mut mgr) = rig(PortKind::Ev3Input, Wire::EV3_INPUT_EMPTY);
    run(&mut mgr, 3);
    board.plug(3, wire);
    let events = run(&mut mgr, 20);
    assert_eq!(classified(&events), vec![expected]);
    assert_eq!(registry.registrations(), 1);
    assert_eq!(registry.live()[0].1.device, expected.to_string());
}

#[test]
fn unknown_pin1_level_is_ambiguous_and_never_attaches() {
    let (board, registry, mut mgr) = rig(PortKind::Ev3Input, Wire::EV3_INPUT_EMPTY);
    run(&mut mgr, 3);
    board.plug(3, Wire::ev3_analog(3500));
    let events = run(&mut mgr, 20);
    assert!(events.iter().any(|e| matches!(
        e,
        PortEvent::Fault {
            error: PortError::ClassificationAmbiguous { .. },
            ..
        }
    )));
    assert_eq!(registry.registrations(), 0);
    assert_eq!(
        mgr.status("p").unwrap().state,
        ConnectionState::WaitingForDisconnect
    );
}

#[rstest]
#[case::wandering(1300, DeviceType::NxtAnalog)]
#[case::drift_at_limit(910, DeviceType::NxtAnalog)]
#[case::drift_below_limit(909, DeviceType::NxtTouch)]
#[case::steady(900, DeviceType::NxtTouch)]
fn nxt_touch_window_rechecks_pin1(#[case] reread_mv: i32, #[case] expected: DeviceType) {
    let (board, _registry, mut mgr) = rig(PortKind::Ev3Input, Wire::EV3_INPUT_EMPTY);
    run(&mut mgr, 3);
    board.plug(3, Wire::nxt_analog(900));
    let mut ticks = 0;
    while mgr.status("p").unwrap().state != ConnectionState::Probing(Probe::NxtTouchRecheck) {
        run(&mut mgr, 1);
        ticks += 1;
        assert!(ticks < 50, "never reached the recheck");
    }
    board.plug(3, Wire::nxt_analog(reread_mv));
    let events = run(&mut mgr, 5);
    assert_eq!(classified(&events), vec![expected]);
}

#[rstest]
#[case::large_motor(Wire::large_motor(), DeviceType::Tacho)]
#[case::medium_motor(Wire::medium_motor(), DeviceType::MiniTacho)]
#[case::new_motor(Wire::output_device(1200), DeviceType::NewTacho)]
#[case::split_by_pin5_high(Wire::motor_needing_probe(2700, 1800), DeviceType::MiniTacho)]
#[case::split_by_pin5_high_large(Wire::motor_needing_probe(4000, 2300), DeviceType::Tacho)]
fn ev3_output_motors(#[case] wire: Wire, #[case] expected: DeviceType) {
    let (board, registry, mut mgr) = rig(PortKind::Ev3Output, Wire::EV3_OUTPUT_EMPTY);
    run(&mut mgr, 3);
    board.plug(3, wire);
    let events = run(&mut mgr, 30);
    assert_eq!(classified(&events), vec![expected]);
    assert_eq!(registry.registrations(), 1);
    let (_, spec) = &registry.live()[0];
    assert_eq!(spec.driver, "ev3-tacho-motor");
    assert!(spec.probe.float_mv.is_some());
    assert!(spec.probe.low_mv.is_some());
    // Probe pins are released again.
    assert_eq!(board.direction(3, Pin::P5), Some(Direction::Input));
    assert_eq!(board.direction(3, Pin::P6), Some(Direction::Input));
}

#[test]
fn output_references_that_differ_are_ambiguous() {
    let (board, registry, mut mgr) = rig(PortKind::Ev3Output, Wire::EV3_OUTPUT_EMPTY);
    run(&mut mgr, 3);
    board.plug(
        3,
        Wire {
            pin5_mv_pin6_low: Some(400),
            ..Wire::output_device(1200)
        },
    );
    let events = run(&mut mgr, 30);
    assert_eq!(classified(&events), vec![DeviceType::Error]);
    assert_eq!(registry.registrations(), 0);
}

#[test]
fn sensor_on_output_port_is_classified_once() {
    let (board, registry, mut mgr) = rig(PortKind::Ev3Output, Wire::EV3_OUTPUT_EMPTY);
    run(&mut mgr, 3);
    // NXT touch/sound or UART sensor: pin6 high, pin5 balanced.
    board.plug(
        3,
        Wire {
            pin6: true,
            ..Wire::EV3_OUTPUT_EMPTY
        },
    );
    let events = run(&mut mgr, 500);
    assert_eq!(classified(&events), vec![DeviceType::Error]);
    assert_eq!(
        mgr.port("p").unwrap().state(),
        ConnectionState::WaitingForDisconnect
    );
    assert_eq!(registry.registrations(), 0);

    board.unplug(3);
    run(&mut mgr, 40);
    assert_eq!(mgr.port("p").unwrap().state(), ConnectionState::NoDevice);
}

#[test]
fn output_detach_after_unplug() {
    let (board, registry, mut mgr) = rig(PortKind::Ev3Output, Wire::EV3_OUTPUT_EMPTY);
    run(&mut mgr, 3);
    board.plug(3, Wire::large_motor());
    run(&mut mgr, 30);
    board.unplug(3);
    run(&mut mgr, 40);
    assert_eq!(registry.unregistrations(), 1);
    assert!(registry.live().is_empty());
}

#[rstest]
#[case::tilt(35, DeviceType::WedoTilt, "wedo-sensor")]
#[case::motion(180, DeviceType::WedoMotion, "wedo-sensor")]
#[case::motor(240, DeviceType::WedoMotor, "wedo-motor")]
#[case::lightbrick(200, DeviceType::WedoLightbrick, "wedo-lightbrick")]
fn wedo_devices_with_drivers(#[case] id: u8, #[case] expected: DeviceType, #[case] driver: &str) {
    let (board, registry, mut mgr) = rig(PortKind::WeDo, Wire::WEDO_EMPTY);
    run(&mut mgr, 3);
    board.plug(3, Wire::wedo(id));
    let events = run(&mut mgr, 20);
    assert_eq!(classified(&events), vec![expected]);
    assert_eq!(registry.live()[0].1.driver, driver);
}

#[test]
fn wedo_device_without_driver_reports_attach_failure() {
    let (board, registry, mut mgr) = rig(PortKind::WeDo, Wire::WEDO_EMPTY);
    run(&mut mgr, 3);
    board.plug(3, Wire::wedo(100));
    let events = run(&mut mgr, 20);
    assert_eq!(classified(&events), vec![DeviceType::WedoTouch]);
    assert!(events.iter().any(|e| matches!(
        e,
        PortEvent::Fault {
            error: PortError::AttachFailed { .. },
            ..
        }
    )));
    assert_eq!(registry.registrations(), 0);
}

#[test]
fn wedo_short_is_ambiguous() {
    let (board, _registry, mut mgr) = rig(PortKind::WeDo, Wire::WEDO_EMPTY);
    run(&mut mgr, 3);
    board.plug(3, Wire::wedo(3));
    let events = run(&mut mgr, 20);
    assert_eq!(classified(&events), vec![DeviceType::Error]);
}

#[test]
fn wedo_swap_is_seen_as_removal() {
    let (board, registry, mut mgr) = rig(PortKind::WeDo, Wire::WEDO_EMPTY);
    run(&mut mgr, 3);
    board.plug(3, Wire::wedo(35));
    run(&mut mgr, 20);
    board.plug(3, Wire::wedo(240));
    let events = run(&mut mgr, 80);
    assert_eq!(classified(&events), vec![DeviceType::WedoMotor]);
    assert_eq!(registry.unregistrations(), 1);
    assert_eq!(registry.live()[0].1.driver, "wedo-motor");
}
