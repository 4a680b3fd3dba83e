//! `From` implementations bridging `portsense_config` types to core types.

use std::time::Duration;

use crate::config::{DispatcherCfg, PortSpec, Settings, Timing};
use crate::types::PortKind;

impl From<&portsense_config::Timing> for Timing {
    fn from(c: &portsense_config::Timing) -> Self {
        Self {
            poll: Duration::from_millis(c.poll_ms),
            settle_ticks: c.settle_ticks,
            add_ticks: c.add_ticks,
            remove_ticks: c.remove_ticks,
        }
    }
}

impl From<&portsense_config::DispatcherCfg> for DispatcherCfg {
    fn from(c: &portsense_config::DispatcherCfg) -> Self {
        Self {
            queue_depth: c.queue_depth,
            nxt_i2c_boot: Duration::from_millis(c.nxt_i2c_boot_ms),
        }
    }
}

impl From<portsense_config::PortKind> for PortKind {
    fn from(k: portsense_config::PortKind) -> Self {
        match k {
            portsense_config::PortKind::Ev3Input => PortKind::Ev3Input,
            portsense_config::PortKind::Ev3Output => PortKind::Ev3Output,
            portsense_config::PortKind::Wedo => PortKind::WeDo,
            portsense_config::PortKind::HtSmux => PortKind::HtSmux,
            portsense_config::PortKind::MsEv3Smux => PortKind::MsEv3Smux,
        }
    }
}

impl From<&portsense_config::PortCfg> for PortSpec {
    fn from(c: &portsense_config::PortCfg) -> Self {
        Self {
            name: c.name.clone(),
            kind: c.kind.into(),
            index: c.index,
            mode: c.mode.clone(),
        }
    }
}

impl From<&portsense_config::Config> for Settings {
    fn from(c: &portsense_config::Config) -> Self {
        Self {
            timing: (&c.timing).into(),
            dispatcher: (&c.dispatcher).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_maps_to_settings() {
        let cfg = portsense_config::load_toml(
            r#"
[timing]
poll_ms = 5
add_ticks = 12

[[ports]]
name = "hub0"
kind = "wedo"
index = 7
mode = "tilt"
"#,
        )
        .unwrap();
        let s = Settings::from(&cfg);
        assert_eq!(s.timing.poll, Duration::from_millis(5));
        assert_eq!(s.timing.add_ticks, 12);
        assert_eq!(s.dispatcher.nxt_i2c_boot, Duration::from_millis(1000));
        let p = PortSpec::from(&cfg.ports[0]);
        assert_eq!(p.kind, PortKind::WeDo);
        assert_eq!(p.mode, "tilt");
    }
}
