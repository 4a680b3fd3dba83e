//! `portsense watch`: supervisor loop on the configured board until Ctrl-C
//! or a tick limit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use portsense_config::Config;
use portsense_core::{PortIo, PortKind, PortManager, Settings, Supervisor};
use portsense_hardware::RecordingRegistry;
use portsense_traits::MonotonicClock;

use crate::report;

pub struct WatchOpts {
    pub ticks: Option<u64>,
    pub set_mode: Vec<(String, String)>,
}

/// Split `PORT=MODE`.
pub fn parse_assignment(s: &str) -> eyre::Result<(String, String)> {
    match s.split_once('=') {
        Some((p, m)) if !p.trim().is_empty() && !m.trim().is_empty() => {
            Ok((p.trim().to_string(), m.trim().to_string()))
        }
        _ => eyre::bail!("expected PORT=MODE, got '{s}'"),
    }
}

pub fn run_watch<B>(
    board: B,
    cfg: &Config,
    opts: &WatchOpts,
    json: bool,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<()>
where
    B: PortIo + Send + 'static,
{
    let settings = Settings::from(cfg);
    let mgr = PortManager::builder()
        .with_io(board)
        .with_registry(RecordingRegistry::new())
        .with_settings(settings)
        .with_ports(crate::board::port_specs(cfg))
        .try_build()
        .wrap_err("bring up ports")?;
    for e in mgr.init_failures() {
        tracing::warn!(error = %e, "port left out");
    }
    let kinds: Vec<(String, PortKind)> = mgr
        .ports()
        .iter()
        .map(|p| (p.name().to_string(), p.kind()))
        .collect();
    let kind_of = |name: &str| kinds.iter().find(|(n, _)| n == name).map(|(_, k)| *k);

    let sup = Supervisor::spawn(mgr, MonotonicClock::new());
    for (port, mode) in &opts.set_mode {
        sup.set_mode(port, mode)?;
    }
    tracing::info!(period_ms = settings.timing.poll.as_millis(), "watching ports");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("interrupted");
            break;
        }
        if opts.ticks.is_some_and(|n| sup.ticks() >= n) {
            break;
        }
        if let Ok(ev) = sup.events().recv_timeout(Duration::from_millis(20)) {
            let tick = sup.ticks();
            for ev in std::iter::once(ev).chain(sup.events().try_iter()) {
                if json {
                    println!("{}", report::event_json(tick, &ev, &kind_of));
                } else {
                    println!("{}", report::event_line(tick, &ev, &kind_of));
                }
            }
        }
    }

    let statuses = sup.status().unwrap_or_default();
    let dropped = sup.dropped_events();
    let ticks = sup.ticks();
    sup.stop();
    if dropped > 0 {
        tracing::warn!(dropped, "events dropped while output was busy");
    }
    tracing::info!(ticks, "watch finished");
    report::print_statuses(&statuses, json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_need_both_halves() {
        assert_eq!(
            parse_assignment("outA = rcx-led").unwrap(),
            ("outA".to_string(), "rcx-led".to_string())
        );
        assert!(parse_assignment("outA").is_err());
        assert!(parse_assignment("=raw").is_err());
    }
}
