//! Runtime settings consumed by the port state machine and dispatcher.
use std::time::Duration;

use crate::error::BuildError;
use crate::types::PortKind;

/// Tick period and debounce thresholds, all in ticks except `poll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub poll: Duration,
    pub settle_ticks: u32,
    pub add_ticks: u32,
    pub remove_ticks: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(10),
            settle_ticks: 2,
            add_ticks: 10,
            remove_ticks: 35,
        }
    }
}

impl Timing {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.poll.is_zero() {
            return Err(BuildError::InvalidConfig("timing.poll must be > 0"));
        }
        if self.settle_ticks == 0 || self.add_ticks == 0 || self.remove_ticks == 0 {
            return Err(BuildError::InvalidConfig("tick thresholds must be >= 1"));
        }
        if self.settle_ticks >= self.add_ticks {
            return Err(BuildError::InvalidConfig(
                "settle_ticks must be smaller than add_ticks",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherCfg {
    pub queue_depth: usize,
    pub nxt_i2c_boot: Duration,
}

impl Default for DispatcherCfg {
    fn default() -> Self {
        Self {
            queue_depth: 16,
            nxt_i2c_boot: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    pub timing: Timing,
    pub dispatcher: DispatcherCfg,
}

/// Static wiring for one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub kind: PortKind,
    pub index: u8,
    pub mode: String,
}

impl PortSpec {
    pub fn new(name: impl Into<String>, kind: PortKind, index: u8) -> Self {
        Self {
            name: name.into(),
            kind,
            index,
            mode: "auto".to_string(),
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }
}
