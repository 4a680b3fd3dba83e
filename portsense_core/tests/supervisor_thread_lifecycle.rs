//! Supervisor thread lifecycle: ticking, commands, teardown on drop.

use portsense_core::mocks::FailingIo;
use portsense_core::{
    DeviceType, DispatcherCfg, PortEvent, PortKind, PortManager, PortSpec, Settings, Supervisor,
    Timing,
};
use portsense_hardware::registry::RecordingRegistry;
use portsense_hardware::sim::{SimBoard, Wire};
use portsense_traits::clock::MonotonicClock;
use std::time::{Duration, Instant};

fn settings() -> Settings {
    Settings {
        timing: Timing {
            poll: Duration::from_millis(1),
            ..Timing::default()
        },
        dispatcher: DispatcherCfg {
            queue_depth: 4,
            nxt_i2c_boot: Duration::ZERO,
        },
    }
}

fn wait_for(deadline: Duration, mut f: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn supervisor_attaches_and_tears_down_on_drop() {
    let board = SimBoard::new();
    board.add_port(0, Wire::EV3_INPUT_EMPTY);
    let registry = RecordingRegistry::new();
    let mut mgr = PortManager::new(board.clone(), registry.clone(), MonotonicClock::new(), &settings());
    mgr.add_port(&PortSpec::new("in1", PortKind::Ev3Input, 0)).unwrap();
    board.plug(0, Wire::ev3_touch());

    let sup = Supervisor::spawn(mgr, MonotonicClock::new());
    let attached = wait_for(Duration::from_secs(5), || {
        sup.events()
            .try_iter()
            .any(|e| matches!(e, PortEvent::Attached { device: DeviceType::Ev3Touch, .. }))
    });
    assert!(attached);
    assert!(sup.ticks() > 0);
    assert_eq!(registry.live().len(), 1);

    let status = sup.status().unwrap();
    assert_eq!(status[0].device, DeviceType::Ev3Touch);

    drop(sup);
    assert!(registry.live().is_empty());
}

#[test]
fn supervisor_serves_mode_changes() {
    let board = SimBoard::new();
    board.add_port(1, Wire::EV3_OUTPUT_EMPTY);
    let registry = RecordingRegistry::new();
    let mut mgr = PortManager::new(board, registry.clone(), MonotonicClock::new(), &settings());
    mgr.add_port(&PortSpec::new("outB", PortKind::Ev3Output, 1)).unwrap();

    let sup = Supervisor::spawn(mgr, MonotonicClock::new());
    sup.set_mode("outB", "rcx-led").unwrap();
    assert!(wait_for(Duration::from_secs(5), || registry.live().len() == 1));
    assert!(sup.set_mode("outB", "nope").is_err());
    sup.stop();
    assert!(registry.live().is_empty());
}

#[test]
fn supervisor_exits_with_a_dead_signal_source() {
    let registry = RecordingRegistry::new();
    let mut mgr = PortManager::new(FailingIo, registry, MonotonicClock::new(), &settings());
    // Floating fails, so the port never comes up.
    assert!(mgr.add_port(&PortSpec::new("in1", PortKind::Ev3Input, 0)).is_err());
    let sup = Supervisor::spawn(mgr, MonotonicClock::new());
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(sup.status().map(|s| s.len()), Some(0));
    drop(sup);
}

#[test]
fn multiple_supervisors_dont_leak_threads() {
    for _ in 0..10 {
        let mgr = PortManager::new(
            SimBoard::new(),
            RecordingRegistry::new(),
            MonotonicClock::new(),
            &settings(),
        );
        let sup = Supervisor::spawn(mgr, MonotonicClock::new());
        std::thread::sleep(Duration::from_millis(5));
        drop(sup);
    }
}
