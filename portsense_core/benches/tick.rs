use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use portsense_core::tables;
use portsense_core::{DispatcherCfg, PortKind, PortManager, PortSpec, Settings, Timing};
use portsense_hardware::registry::RecordingRegistry;
use portsense_hardware::sim::{SimBoard, Wire};
use portsense_traits::clock::MonotonicClock;
use std::time::Duration;

fn settings() -> Settings {
    Settings {
        timing: Timing {
            poll: Duration::from_millis(1),
            ..Timing::default()
        },
        dispatcher: DispatcherCfg {
            queue_depth: 16,
            nxt_i2c_boot: Duration::ZERO,
        },
    }
}

// Eight input and four output ports, a device on every other one.
fn busy_rig() -> PortManager<SimBoard> {
    let board = SimBoard::new();
    let mut specs = Vec::new();
    for i in 0..8u8 {
        board.add_port(i, Wire::EV3_INPUT_EMPTY);
        if i % 2 == 0 {
            board.plug(i, Wire::ev3_touch());
        }
        specs.push(PortSpec::new(format!("in{i}"), PortKind::Ev3Input, i));
    }
    for i in 8..12u8 {
        board.add_port(i, Wire::EV3_OUTPUT_EMPTY);
        if i % 2 == 0 {
            board.plug(i, Wire::large_motor());
        }
        specs.push(PortSpec::new(format!("out{i}"), PortKind::Ev3Output, i));
    }
    let mut mgr = PortManager::new(
        board,
        RecordingRegistry::new(),
        MonotonicClock::new(),
        &settings(),
    );
    for s in &specs {
        let _ = mgr.add_port(s);
    }
    mgr
}

pub fn bench_tick(c: &mut Criterion) {
    c.bench_function("tick_12_ports_steady", |b| {
        let mut mgr = busy_rig();
        for _ in 0..40 {
            mgr.tick();
            mgr.wait_idle(Duration::from_secs(1));
        }
        b.iter(|| black_box(mgr.tick()));
    });

    c.bench_function("tick_12_ports_from_cold", |b| {
        b.iter_batched(
            busy_rig,
            |mut mgr| {
                for _ in 0..20 {
                    black_box(mgr.tick());
                }
                mgr
            },
            BatchSize::SmallInput,
        );
    });
}

pub fn bench_tables(c: &mut Criterion) {
    c.bench_function("classify_ev3_pin1_sweep", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for mv in (0..5000).step_by(7) {
                if tables::classify_ev3_pin1(black_box(mv)).is_concrete() {
                    acc += 1;
                }
            }
            acc
        });
    });
}

criterion_group!(benches, bench_tick, bench_tables);
criterion_main!(benches);
