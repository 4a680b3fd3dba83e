//! In-memory device registry that records every registration.
use portsense_traits::{BoxError, DeviceHandle, DeviceRegistry, DeviceSpec};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use crate::error::HwError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Registered {
        handle: DeviceHandle,
        spec: DeviceSpec,
    },
    Unregistered {
        handle: DeviceHandle,
        spec: DeviceSpec,
    },
}

#[derive(Debug, Default)]
struct Ledger {
    next: u64,
    live: BTreeMap<DeviceHandle, DeviceSpec>,
    events: Vec<RegistryEvent>,
    rejected: BTreeSet<String>,
}

/// Cloneable: every clone shares one ledger, so a test can keep a handle
/// while the dispatcher owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingRegistry {
    ledger: Arc<Mutex<Ledger>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every future registration for `driver`.
    pub fn reject_driver(&self, driver: &str) {
        if let Ok(mut l) = self.ledger.lock() {
            l.rejected.insert(driver.to_string());
        }
    }

    pub fn accept_driver(&self, driver: &str) {
        if let Ok(mut l) = self.ledger.lock() {
            l.rejected.remove(driver);
        }
    }

    pub fn events(&self) -> Vec<RegistryEvent> {
        self.ledger
            .lock()
            .map(|l| l.events.clone())
            .unwrap_or_default()
    }

    pub fn live(&self) -> Vec<(DeviceHandle, DeviceSpec)> {
        self.ledger
            .lock()
            .map(|l| l.live.iter().map(|(h, s)| (*h, s.clone())).collect())
            .unwrap_or_default()
    }

    pub fn registrations(&self) -> usize {
        self.count(|e| matches!(e, RegistryEvent::Registered { .. }))
    }

    pub fn unregistrations(&self) -> usize {
        self.count(|e| matches!(e, RegistryEvent::Unregistered { .. }))
    }

    fn count(&self, pred: impl Fn(&RegistryEvent) -> bool) -> usize {
        self.ledger
            .lock()
            .map(|l| l.events.iter().filter(|e| pred(e)).count())
            .unwrap_or(0)
    }
}

impl DeviceRegistry for RecordingRegistry {
    fn register(&mut self, spec: &DeviceSpec) -> Result<DeviceHandle, BoxError> {
        let mut l = self.ledger.lock().map_err(|_| HwError::Poisoned)?;
        if l.rejected.contains(&spec.driver) {
            return Err(HwError::Rejected {
                driver: spec.driver.clone(),
                reason: "driver refused the device".to_string(),
            }
            .into());
        }
        l.next += 1;
        let handle = DeviceHandle(l.next);
        l.live.insert(handle, spec.clone());
        l.events.push(RegistryEvent::Registered {
            handle,
            spec: spec.clone(),
        });
        tracing::debug!(
            handle = handle.0,
            driver = %spec.driver,
            port = %spec.port,
            "device registered"
        );
        Ok(handle)
    }

    fn unregister(&mut self, handle: DeviceHandle) -> Result<(), BoxError> {
        let mut l = self.ledger.lock().map_err(|_| HwError::Poisoned)?;
        let spec = l
            .live
            .remove(&handle)
            .ok_or(HwError::UnknownHandle(handle.0))?;
        tracing::debug!(handle = handle.0, port = %spec.port, "device unregistered");
        l.events.push(RegistryEvent::Unregistered { handle, spec });
        Ok(())
    }
}
