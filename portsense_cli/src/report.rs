//! Text and JSON rendering of events and port statuses.

use portsense_core::{PortEvent, PortKind, PortStatus};
use serde_json::{Value, json};

fn mode_name(ev: &PortEvent, kinds: &dyn Fn(&str) -> Option<PortKind>) -> String {
    match ev {
        PortEvent::ModeChanged { port, mode } => kinds(port)
            .and_then(|k| mode.name(k))
            .map_or_else(|| format!("{mode:?}"), ToString::to_string),
        _ => String::new(),
    }
}

/// Stable snake_case tag for an event.
pub fn event_name(ev: &PortEvent) -> &'static str {
    match ev {
        PortEvent::StateChanged { .. } => "state_changed",
        PortEvent::Classified { .. } => "classified",
        PortEvent::AttachScheduled { .. } => "attach_scheduled",
        PortEvent::DetachScheduled { .. } => "detach_scheduled",
        PortEvent::Attached { .. } => "attached",
        PortEvent::Detached { .. } => "detached",
        PortEvent::Fault { .. } => "fault",
        PortEvent::ModeChanged { .. } => "mode_changed",
    }
}

pub fn event_json(
    tick: u64,
    ev: &PortEvent,
    kinds: &dyn Fn(&str) -> Option<PortKind>,
) -> Value {
    let mut v = json!({
        "tick": tick,
        "port": ev.port(),
        "event": event_name(ev),
    });
    let extra = match ev {
        PortEvent::StateChanged { from, to, .. } => {
            json!({ "from": from.to_string(), "to": to.to_string() })
        }
        PortEvent::Classified { device, .. }
        | PortEvent::AttachScheduled { device, .. }
        | PortEvent::Detached { device, .. } => json!({ "device": device.to_string() }),
        PortEvent::Attached { device, handle, .. } => {
            json!({ "device": device.to_string(), "handle": handle.0 })
        }
        PortEvent::Fault { error, .. } => json!({ "error": error.to_string() }),
        PortEvent::ModeChanged { .. } => json!({ "mode": mode_name(ev, kinds) }),
        PortEvent::DetachScheduled { .. } => Value::Null,
    };
    if let (Value::Object(base), Value::Object(more)) = (&mut v, extra) {
        base.extend(more);
    }
    v
}

pub fn event_line(tick: u64, ev: &PortEvent, kinds: &dyn Fn(&str) -> Option<PortKind>) -> String {
    let detail = match ev {
        PortEvent::StateChanged { from, to, .. } => format!("{from} -> {to}"),
        PortEvent::Classified { device, .. } => format!("classified as {device}"),
        PortEvent::AttachScheduled { device, .. } => format!("attach {device} scheduled"),
        PortEvent::DetachScheduled { .. } => "detach scheduled".to_string(),
        PortEvent::Attached { device, handle, .. } => {
            format!("attached {device} (handle {})", handle.0)
        }
        PortEvent::Detached { device, .. } => format!("detached {device}"),
        PortEvent::Fault { error, .. } => format!("fault: {error}"),
        PortEvent::ModeChanged { .. } => format!("mode -> {}", mode_name(ev, kinds)),
    };
    format!("[{tick:>6}] {:<8} {detail}", ev.port())
}

pub fn status_json(s: &PortStatus) -> Value {
    json!({
        "port": s.name,
        "kind": s.kind.name(),
        "mode": s.mode,
        "state": s.state.to_string(),
        "device": s.device.to_string(),
        "attached": s.is_attached(),
        "pending": s.pending,
    })
}

pub fn status_table(statuses: &[PortStatus]) -> String {
    let mut out = format!(
        "{:<8} {:<10} {:<16} {:<24} {:<16} {}\n",
        "PORT", "KIND", "MODE", "STATE", "DEVICE", "ATTACHED"
    );
    for s in statuses {
        out.push_str(&format!(
            "{:<8} {:<10} {:<16} {:<24} {:<16} {}{}\n",
            s.name,
            s.kind.name(),
            s.mode,
            s.state.to_string(),
            s.device.to_string(),
            if s.is_attached() { "yes" } else { "no" },
            if s.pending { " (pending)" } else { "" },
        ));
    }
    out
}

/// Print statuses in the selected output style.
pub fn print_statuses(statuses: &[PortStatus], json: bool) {
    if json {
        for s in statuses {
            println!("{}", json!({ "status": status_json(s) }));
        }
    } else {
        print!("{}", status_table(statuses));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portsense_core::{ConnectionState, DeviceType, Mode, PortError};
    use portsense_traits::DeviceHandle;

    fn kinds(_: &str) -> Option<PortKind> {
        Some(PortKind::Ev3Output)
    }

    #[test]
    fn attached_event_carries_device_and_handle() {
        let ev = PortEvent::Attached {
            port: "in1".into(),
            device: DeviceType::Ev3Touch,
            handle: DeviceHandle(7),
        };
        let v = event_json(12, &ev, &kinds);
        assert_eq!(v["event"], "attached");
        assert_eq!(v["tick"], 12);
        assert_eq!(v["handle"], 7);
        assert_eq!(v["device"], DeviceType::Ev3Touch.to_string());
    }

    #[test]
    fn mode_change_uses_table_name() {
        let ev = PortEvent::ModeChanged {
            port: "outA".into(),
            mode: Mode::Forced(DeviceType::RcxLed),
        };
        assert_eq!(event_json(0, &ev, &kinds)["mode"], "rcx-led");
        assert!(event_line(0, &ev, &kinds).ends_with("mode -> rcx-led"));
    }

    #[test]
    fn fault_and_state_lines_are_readable() {
        let ev = PortEvent::Fault {
            port: "in2".into(),
            error: PortError::ClassificationAmbiguous {
                port: "in2".into(),
                detail: "pin1 3500 mV".into(),
            },
        };
        assert!(event_line(3, &ev, &kinds).contains("classification ambiguous"));

        let ev = PortEvent::StateChanged {
            port: "in2".into(),
            from: ConnectionState::NoDevice,
            to: ConnectionState::Connected,
        };
        assert!(event_line(3, &ev, &kinds).contains("no-device -> connected"));
    }
}
