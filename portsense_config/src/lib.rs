#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and signal-trace parsing for portsense.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The trace CSV loader enforces exact headers and tick ordering.
use serde::Deserialize;
use std::collections::HashSet;

/// Signal trace CSV schema.
///
/// Expected headers:
/// tick,port,pin1_mv,pin5_mv,pin6_mv,pin2,pin5,pin6,id
///
/// Digital columns are 0 or 1. A row applies from its tick until the next
/// row for the same port.
///
/// Example:
/// tick,port,pin1_mv,pin5_mv,pin6_mv,pin2,pin5,pin6,id
/// 0,0,5000,0,0,1,1,0,0
/// 5,0,417,0,0,1,1,0,0
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TraceRow {
    pub tick: u64,
    pub port: u8,
    pub pin1_mv: i32,
    pub pin5_mv: i32,
    pub pin6_mv: i32,
    pub pin2: u8,
    pub pin5: u8,
    pub pin6: u8,
    pub id: u8,
}

pub const TRACE_HEADERS: [&str; 9] = [
    "tick", "port", "pin1_mv", "pin5_mv", "pin6_mv", "pin2", "pin5", "pin6", "id",
];

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Timing {
    /// Tick period in milliseconds.
    pub poll_ms: u64,
    /// Ticks to wait for pins to settle after floating or driving them.
    pub settle_ticks: u32,
    /// Ticks a new observation must hold before classification.
    pub add_ticks: u32,
    /// Ticks the baseline must hold before a device counts as removed.
    pub remove_ticks: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_ms: 10,
            settle_ticks: 2,
            add_ticks: 10,
            remove_ticks: 35,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DispatcherCfg {
    /// Bounded job queue depth shared by all ports.
    pub queue_depth: usize,
    /// Boot wait before an NXT I2C sensor is registered.
    pub nxt_i2c_boot_ms: u64,
}

impl Default for DispatcherCfg {
    fn default() -> Self {
        Self {
            queue_depth: 16,
            nxt_i2c_boot_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Hardware {
    /// IIO device directory holding `in_voltageN_raw` files.
    pub iio_dir: String,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            iio_dir: "/sys/bus/iio/devices/iio:device0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PortKind {
    Ev3Input,
    Ev3Output,
    Wedo,
    HtSmux,
    MsEv3Smux,
}

/// BCM lines and IIO channels for one connector (hardware backend only).
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Wiring {
    pub pin1: Option<u8>,
    pub pin2: Option<u8>,
    pub pin5: Option<u8>,
    pub pin6: Option<u8>,
    pub adc_pin1: Option<u32>,
    pub adc_pin5: Option<u32>,
    pub adc_pin6: Option<u32>,
    pub adc_id: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortCfg {
    pub name: String,
    pub kind: PortKind,
    /// Hardware slot; unique across all ports.
    pub index: u8,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub wiring: Option<Wiring>,
}

fn default_mode() -> String {
    "auto".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub dispatcher: DispatcherCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub hardware: Hardware,
    pub ports: Vec<PortCfg>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_trace_csv(path: &std::path::Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open trace CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != TRACE_HEADERS {
        eyre::bail!(
            "trace CSV must have headers '{}', got: {}",
            TRACE_HEADERS.join(","),
            actual.join(",")
        );
    }

    let mut rows: Vec<TraceRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        let line = idx + 2;
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {line}: {e}"))?;
        for (name, v) in [("pin2", row.pin2), ("pin5", row.pin5), ("pin6", row.pin6)] {
            if v > 1 {
                eyre::bail!("invalid CSV row {line}: {name} must be 0 or 1, got {v}");
            }
        }
        if let Some(prev) = rows.last()
            && row.tick < prev.tick
        {
            eyre::bail!(
                "invalid CSV row {line}: tick {} goes backwards (previous {})",
                row.tick,
                prev.tick
            );
        }
        rows.push(row);
    }
    if rows.is_empty() {
        eyre::bail!("trace CSV {:?} has no rows", path);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Timing
        if self.timing.poll_ms == 0 {
            eyre::bail!("timing.poll_ms must be >= 1");
        }
        if self.timing.poll_ms > 1000 {
            eyre::bail!("timing.poll_ms is unreasonably large (>1s)");
        }
        if self.timing.settle_ticks == 0 {
            eyre::bail!("timing.settle_ticks must be >= 1");
        }
        if self.timing.add_ticks == 0 {
            eyre::bail!("timing.add_ticks must be >= 1");
        }
        if self.timing.remove_ticks == 0 {
            eyre::bail!("timing.remove_ticks must be >= 1");
        }
        if self.timing.settle_ticks >= self.timing.add_ticks {
            eyre::bail!("timing.settle_ticks must be < timing.add_ticks");
        }

        // Dispatcher
        if self.dispatcher.queue_depth == 0 {
            eyre::bail!("dispatcher.queue_depth must be >= 1");
        }
        if self.dispatcher.nxt_i2c_boot_ms > 60_000 {
            eyre::bail!("dispatcher.nxt_i2c_boot_ms is unreasonably large (>60s)");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Ports
        if self.ports.is_empty() {
            eyre::bail!("ports must list at least one port");
        }
        let mut names = HashSet::new();
        let mut slots = HashSet::new();
        for p in &self.ports {
            if p.name.trim().is_empty() {
                eyre::bail!("ports.name must not be empty");
            }
            if !names.insert(p.name.as_str()) {
                eyre::bail!("ports.name '{}' is used more than once", p.name);
            }
            if !slots.insert(p.index) {
                eyre::bail!("ports.index {} is used more than once", p.index);
            }
            if p.mode.trim().is_empty() {
                eyre::bail!("ports.mode for '{}' must not be empty", p.name);
            }
        }

        Ok(())
    }
}
