//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "portsense", version, about = "Port connection and device identification")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/portsense.toml")]
    pub config: PathBuf,

    /// Print events and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

/// Port kinds as spelled on the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum KindArg {
    Ev3Input,
    Ev3Output,
    Wedo,
    HtSmux,
    MsEv3Smux,
}

impl From<KindArg> for portsense_core::PortKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Ev3Input => Self::Ev3Input,
            KindArg::Ev3Output => Self::Ev3Output,
            KindArg::Wedo => Self::WeDo,
            KindArg::HtSmux => Self::HtSmux,
            KindArg::MsEv3Smux => Self::MsEv3Smux,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the identification loop on the configured ports
    Watch {
        /// Stop after this many ticks (default: run until Ctrl-C)
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Set a port mode once the loop is running, as PORT=MODE (repeatable)
        #[arg(long = "set-mode", value_name = "PORT=MODE")]
        set_mode: Vec<String>,
        /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on supported OSes.\n\nLinux: Attempts SCHED_FIFO priority, pins to a CPU, and calls mlockall to lock the process address space into RAM. This keeps tick jitter low but may require elevated privileges or ulimits (e.g., memlock).\n\nmacOS: Only mlockall is applied; SCHED_FIFO/affinity are unavailable."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO on Linux (1..=max); ignored on macOS
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Select memory locking mode for --rt: none, current, or all
        #[arg(
            long,
            value_enum,
            value_name = "MODE",
            long_help = "Select memory locking mode when --rt is enabled.\n- none: do not lock memory.\n- current: lock currently resident pages (mlockall(MCL_CURRENT)).\n- all: lock current and future pages (mlockall(MCL_CURRENT|MCL_FUTURE)).\nDefault: current on Linux, none on macOS."
        )]
        rt_lock: Option<RtLock>,
        /// CPU index to pin the process to (Linux only, default 0)
        #[arg(long, value_name = "CPU")]
        rt_cpu: Option<usize>,
    },
    /// Replay a recorded signal trace through the simulated board
    Replay {
        /// Trace CSV (tick,port,pin1_mv,pin5_mv,pin6_mv,pin2,pin5,pin6,id)
        #[arg(long, value_name = "FILE")]
        trace: PathBuf,
        /// Keep ticking this many ticks past the last row (default: remove_ticks + add_ticks)
        #[arg(long, value_name = "N")]
        tail: Option<u64>,
    },
    /// List the mode names each port kind accepts
    Modes {
        /// Only this kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Validate config and classification tables, then bring the ports up once
    SelfCheck,
}
