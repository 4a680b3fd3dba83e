use portsense_traits::DeviceHandle;

use crate::error::PortError;
use crate::types::{ConnectionState, DeviceType, Mode};

/// Observable side effects of ticks, completions and mode changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    StateChanged {
        port: String,
        from: ConnectionState,
        to: ConnectionState,
    },
    Classified {
        port: String,
        device: DeviceType,
    },
    AttachScheduled {
        port: String,
        device: DeviceType,
    },
    DetachScheduled {
        port: String,
    },
    Attached {
        port: String,
        device: DeviceType,
        handle: DeviceHandle,
    },
    Detached {
        port: String,
        device: DeviceType,
    },
    Fault {
        port: String,
        error: PortError,
    },
    ModeChanged {
        port: String,
        mode: Mode,
    },
}

impl PortEvent {
    pub fn port(&self) -> &str {
        match self {
            PortEvent::StateChanged { port, .. }
            | PortEvent::Classified { port, .. }
            | PortEvent::AttachScheduled { port, .. }
            | PortEvent::DetachScheduled { port }
            | PortEvent::Attached { port, .. }
            | PortEvent::Detached { port, .. }
            | PortEvent::Fault { port, .. }
            | PortEvent::ModeChanged { port, .. } => port,
        }
    }
}
