//! `portsense replay`: feed a recorded signal trace through the simulated
//! board, one row-set per tick, and print what the ports made of it.

use std::path::Path;
use std::time::Duration;

use portsense_config::{Config, TraceRow};
use portsense_core::{PortEvent, PortManager, PortStatus, Settings};
use portsense_hardware::{RecordingRegistry, Wire};
use portsense_traits::MonotonicClock;

use crate::report;

const SETTLE_WAIT: Duration = Duration::from_secs(5);

pub fn wire_for(row: &TraceRow) -> Wire {
    Wire {
        pin1_mv: row.pin1_mv,
        pin5_mv: row.pin5_mv,
        pin6_mv: row.pin6_mv,
        pin2: row.pin2 != 0,
        pin5: row.pin5 != 0,
        pin6: row.pin6 != 0,
        id: row.id,
        pin5_mv_pin6_low: None,
        pin5_mv_pin5_high: None,
    }
}

/// Outcome of a replay, for printing and tests.
#[derive(Debug)]
pub struct Replay {
    pub events: Vec<(u64, PortEvent)>,
    pub statuses: Vec<PortStatus>,
    pub ticks: u64,
}

pub fn replay(cfg: &Config, rows: &[TraceRow], tail: Option<u64>) -> eyre::Result<Replay> {
    let board = crate::board::sim_board(cfg);
    for r in rows {
        if board.wire(r.port).is_none() {
            eyre::bail!("trace row at tick {} names port index {} which is not configured", r.tick, r.port);
        }
    }

    let settings = Settings::from(cfg);
    let mut mgr = PortManager::builder()
        .with_io(board.clone())
        .with_registry(RecordingRegistry::new())
        .with_clock(MonotonicClock::new())
        .with_settings(settings)
        .with_ports(crate::board::port_specs(cfg))
        .try_build()?;
    if let Some(e) = mgr.init_failures().first() {
        return Err(e.clone().into());
    }

    let tail = tail.unwrap_or_else(|| {
        u64::from(settings.timing.remove_ticks) + u64::from(settings.timing.add_ticks)
    });
    let last = rows.last().map_or(0, |r| r.tick);
    let end = last.saturating_add(tail);

    let mut events = Vec::new();
    let mut next = rows.iter().peekable();
    for tick in 0..=end {
        while let Some(row) = next.next_if(|r| r.tick == tick) {
            board.plug(row.port, wire_for(row));
        }
        let mut evs = mgr.tick();
        // Jobs finish within the tick that scheduled them, so output does
        // not depend on dispatcher timing.
        evs.extend(mgr.wait_idle(SETTLE_WAIT));
        events.extend(evs.into_iter().map(|e| (tick, e)));
    }
    tracing::debug!(ticks = end + 1, events = events.len(), "replay finished");

    Ok(Replay {
        events,
        statuses: mgr.statuses(),
        ticks: end + 1,
    })
}

pub fn run_replay(cfg: &Config, trace: &Path, tail: Option<u64>, json: bool) -> eyre::Result<()> {
    let rows = portsense_config::load_trace_csv(trace)?;
    tracing::info!(rows = rows.len(), trace = %trace.display(), "replaying trace");
    let out = replay(cfg, &rows, tail)?;
    let kind_of = |name: &str| {
        out.statuses
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.kind)
    };
    for (tick, ev) in &out.events {
        if json {
            println!("{}", report::event_json(*tick, ev, &kind_of));
        } else {
            println!("{}", report::event_line(*tick, ev, &kind_of));
        }
    }
    report::print_statuses(&out.statuses, json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portsense_core::DeviceType;

    fn config() -> Config {
        portsense_config::load_toml(
            r#"
            [dispatcher]
            nxt_i2c_boot_ms = 0

            [[ports]]
            name = "in1"
            kind = "ev3-input"
            index = 0
            "#,
        )
        .unwrap()
    }

    fn row(tick: u64, wire: Wire) -> TraceRow {
        TraceRow {
            tick,
            port: 0,
            pin1_mv: wire.pin1_mv,
            pin5_mv: wire.pin5_mv,
            pin6_mv: wire.pin6_mv,
            pin2: u8::from(wire.pin2),
            pin5: u8::from(wire.pin5),
            pin6: u8::from(wire.pin6),
            id: wire.id,
        }
    }

    #[test]
    fn touch_sensor_is_attached_once_then_removed() {
        let rows = [
            row(0, Wire::EV3_INPUT_EMPTY),
            row(5, Wire::ev3_touch()),
            row(40, Wire::EV3_INPUT_EMPTY),
        ];
        let out = replay(&config(), &rows, None).unwrap();
        let attached: Vec<_> = out
            .events
            .iter()
            .filter(|(_, e)| matches!(e, PortEvent::Attached { .. }))
            .collect();
        assert_eq!(attached.len(), 1);
        assert!(matches!(
            attached[0].1,
            PortEvent::Attached {
                device: DeviceType::Ev3Touch,
                ..
            }
        ));
        let detached = out
            .events
            .iter()
            .filter(|(_, e)| matches!(e, PortEvent::Detached { .. }))
            .count();
        assert_eq!(detached, 1);
        assert!(!out.statuses[0].is_attached());
    }

    #[test]
    fn rows_for_unconfigured_ports_are_rejected() {
        let mut bad = row(0, Wire::EV3_INPUT_EMPTY);
        bad.port = 9;
        let err = replay(&config(), &[bad], Some(0)).unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
