use portsense_traits::DeviceHandle;

use crate::types::{ConnectionState, DeviceType, PortKind};

/// Snapshot of one port for display and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStatus {
    pub name: String,
    pub kind: PortKind,
    /// Mode table name, e.g. `auto` or `nxt-i2c`.
    pub mode: &'static str,
    pub state: ConnectionState,
    pub device: DeviceType,
    pub handle: Option<DeviceHandle>,
    pub pending: bool,
}

impl PortStatus {
    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }
}
