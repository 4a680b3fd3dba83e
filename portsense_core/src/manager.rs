//! Owns the ports, the shared signal source and the dispatcher.
use std::time::{Duration, Instant};

use portsense_traits::clock::Clock;
use portsense_traits::{Channel, DeviceRegistry};

use crate::builder::PortManagerBuilder;
use crate::config::{PortSpec, Settings, Timing};
use crate::dispatcher::Dispatcher;
use crate::error::PortError;
use crate::events::PortEvent;
use crate::family::PortIo;
use crate::port::Port;
use crate::status::PortStatus;
use crate::types::{Mode, PortId};

pub struct PortManager<B: PortIo> {
    io: B,
    ports: Vec<Port>,
    dispatcher: Dispatcher,
    timing: Timing,
    init_failures: Vec<PortError>,
    shut_down: bool,
}

impl<B: PortIo> std::fmt::Debug for PortManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortManager")
            .field("ports", &self.ports)
            .field("timing", &self.timing)
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}

impl<B: PortIo> PortManager<B> {
    pub fn new<R, C>(io: B, registry: R, clock: C, settings: &Settings) -> Self
    where
        R: DeviceRegistry + 'static,
        C: Clock + Send + 'static,
    {
        Self {
            io,
            ports: Vec::new(),
            dispatcher: Dispatcher::spawn(registry, clock, &settings.dispatcher),
            timing: settings.timing,
            init_failures: Vec::new(),
            shut_down: false,
        }
    }

    pub fn builder() -> PortManagerBuilder<B> {
        PortManagerBuilder::new()
    }

    /// Bring a port under management: float its pins and apply its mode.
    pub fn add_port(&mut self, spec: &PortSpec) -> Result<(), PortError> {
        if self.ports.iter().any(|p| p.name() == spec.name) {
            return Err(PortError::DuplicatePort(spec.name.clone()));
        }
        // `auto` in a port spec means "however this kind starts".
        let mode = if spec.mode.trim() == "auto" {
            spec.kind.initial_mode()
        } else {
            Mode::parse(spec.kind, &spec.mode, &spec.name)?
        };
        let slot = self.ports.len();
        let mut port = Port::new(
            slot,
            PortId {
                index: spec.index,
                name: spec.name.clone(),
            },
            spec.kind,
        );
        port.float(&mut self.io)?;
        // The port only joins the manager once its mode is in place.
        if mode != Mode::Auto {
            let mut events = Vec::new();
            port.set_mode(mode, &mut self.io, &mut self.dispatcher, &mut events)?;
        }
        tracing::info!(port = %spec.name, kind = %spec.kind, index = spec.index, mode = %spec.mode, "port added");
        self.ports.push(port);
        Ok(())
    }

    pub(crate) fn record_init_failure(&mut self, e: PortError) {
        self.init_failures.push(e);
    }

    /// Ports that could not be brought up by the builder.
    pub fn init_failures(&self) -> &[PortError] {
        &self.init_failures
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn io(&self) -> &B {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut B {
        &mut self.io
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name() == name)
    }

    fn slot_of(&self, name: &str) -> Result<usize, PortError> {
        self.ports
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| PortError::UnknownPort(name.to_string()))
    }

    fn apply_completions(&mut self, events: &mut Vec<PortEvent>) {
        for c in self.dispatcher.drain() {
            match self.ports.get_mut(c.slot) {
                Some(port) => port.apply(c, events),
                None => tracing::warn!(slot = c.slot, "completion for unknown port slot"),
            }
        }
    }

    /// One tick: apply finished jobs, then advance every port once.
    pub fn tick(&mut self) -> Vec<PortEvent> {
        let mut events = Vec::new();
        if self.shut_down {
            return events;
        }
        self.apply_completions(&mut events);
        for port in &mut self.ports {
            port.tick(&mut self.io, &mut self.dispatcher, &self.timing, &mut events);
        }
        events
    }

    /// Switch `port` to the mode named `mode`. Unknown names are rejected
    /// before anything changes.
    pub fn set_mode(&mut self, port: &str, mode: &str) -> Result<Vec<PortEvent>, PortError> {
        let slot = self.slot_of(port)?;
        let mode = Mode::parse(self.ports[slot].kind, mode, port)?;
        let mut events = Vec::new();
        self.apply_completions(&mut events);
        self.ports[slot].set_mode(mode, &mut self.io, &mut self.dispatcher, &mut events)?;
        Ok(events)
    }

    pub fn status(&self, port: &str) -> Result<PortStatus, PortError> {
        self.port(port)
            .map(Port::status)
            .ok_or_else(|| PortError::UnknownPort(port.to_string()))
    }

    pub fn statuses(&self) -> Vec<PortStatus> {
        self.ports.iter().map(Port::status).collect()
    }

    /// Analog readings for a port, mostly useful in raw mode.
    pub fn raw_sample(&mut self, port: &str) -> Result<Vec<(Channel, i32)>, PortError> {
        let slot = self.slot_of(port)?;
        self.ports[slot].raw_sample(&mut self.io)
    }

    /// Apply completions until no port has a job in flight or `timeout`
    /// elapses.
    pub fn wait_idle(&mut self, timeout: Duration) -> Vec<PortEvent> {
        let start = Instant::now();
        let mut events = Vec::new();
        loop {
            self.apply_completions(&mut events);
            if !self.ports.iter().any(Port::is_pending) {
                break;
            }
            let left = timeout.saturating_sub(start.elapsed());
            if left.is_zero() {
                tracing::warn!("timed out waiting for dispatcher");
                break;
            }
            if let Some(c) = self.dispatcher.wait_any(left) {
                match self.ports.get_mut(c.slot) {
                    Some(port) => port.apply(c, &mut events),
                    None => tracing::warn!(slot = c.slot, "completion for unknown port slot"),
                }
            }
        }
        events
    }

    /// Cancel pending work, detach every device and float every port.
    pub fn shutdown(&mut self) -> Vec<PortEvent> {
        let mut events = Vec::new();
        if self.shut_down {
            return events;
        }
        self.apply_completions(&mut events);
        for port in &mut self.ports {
            port.teardown(&mut self.io, &mut self.dispatcher, &mut events);
        }
        self.shut_down = true;
        tracing::debug!(ports = self.ports.len(), "port manager shut down");
        events
    }
}

impl<B: PortIo> Drop for PortManager<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
