#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Port connection and identification (hardware-agnostic).
//!
//! Every physical port runs a small state machine that floats its pins,
//! watches for a stable non-idle signal, classifies the device from a set
//! of voltage tables and asks a background dispatcher to register it. The
//! same machine watches for removal and unregisters the device again. All
//! electrical access goes through `portsense_traits::SignalSource` and
//! `portsense_traits::PinDriver`; registration goes through
//! `portsense_traits::DeviceRegistry`.
//!
//! ## Architecture
//!
//! - **Tables**: band tables mapping millivolts and WeDo ids to device classes (`tables`)
//! - **Families**: per-port-kind sampling, probing and presence checks (`family`)
//! - **Port**: the connection state machine, one transition per tick (`port`)
//! - **Dispatcher**: worker thread for blocking attach/detach work (`dispatcher`)
//! - **Manager**: owns ports, signal source and dispatcher (`manager`, `builder`)
//! - **Supervisor**: paced tick loop on its own thread (`supervisor`)

pub mod builder;
pub mod config;
pub mod conversions;
pub mod debounce;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod family;
pub mod flags;
pub mod hw_error;
pub mod manager;
pub mod mocks;
pub mod port;
pub mod status;
pub mod supervisor;
pub mod tables;
pub mod types;

pub use builder::PortManagerBuilder;
pub use config::{DispatcherCfg, PortSpec, Settings, Timing};
pub use dispatcher::{Completion, Device, Dispatcher, Outcome, Ticket};
pub use error::{BuildError, PortError, Result};
pub use events::PortEvent;
pub use family::PortIo;
pub use flags::PinFlags;
pub use manager::PortManager;
pub use port::Port;
pub use status::PortStatus;
pub use supervisor::Supervisor;
pub use types::{ConnectionState, DeviceType, Family, Mode, PortId, PortKind, Probe};
