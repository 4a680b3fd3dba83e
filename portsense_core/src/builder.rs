//! Type-state builder for `PortManager`.
//!
//! `build()` only exists once a signal source and a registry are provided;
//! `try_build()` is always available and reports the missing piece.

use std::marker::PhantomData;

use portsense_traits::DeviceRegistry;
use portsense_traits::clock::{Clock, MonotonicClock};

use crate::config::{PortSpec, Settings, Timing};
use crate::error::{BuildError, Result};
use crate::family::PortIo;
use crate::manager::PortManager;

pub struct Missing;
pub struct Set;

pub struct PortManagerBuilder<B, I = Missing, R = Missing> {
    io: Option<B>,
    registry: Option<Box<dyn DeviceRegistry>>,
    clock: Option<Box<dyn Clock + Send>>,
    settings: Settings,
    ports: Vec<PortSpec>,
    _i: PhantomData<I>,
    _r: PhantomData<R>,
}

impl<B> PortManagerBuilder<B, Missing, Missing> {
    pub fn new() -> Self {
        Self {
            io: None,
            registry: None,
            clock: None,
            settings: Settings::default(),
            ports: Vec::new(),
            _i: PhantomData,
            _r: PhantomData,
        }
    }
}

impl<B> Default for PortManagerBuilder<B, Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, I, R> PortManagerBuilder<B, I, R> {
    fn retag<I2, R2>(self) -> PortManagerBuilder<B, I2, R2> {
        PortManagerBuilder {
            io: self.io,
            registry: self.registry,
            clock: self.clock,
            settings: self.settings,
            ports: self.ports,
            _i: PhantomData,
            _r: PhantomData,
        }
    }

    pub fn with_io(mut self, io: B) -> PortManagerBuilder<B, Set, R> {
        self.io = Some(io);
        self.retag()
    }

    pub fn with_registry<T: DeviceRegistry + 'static>(
        mut self,
        registry: T,
    ) -> PortManagerBuilder<B, I, Set> {
        self.registry = Some(Box::new(registry));
        self.retag()
    }

    /// Clock for the dispatcher's boot waits. Defaults to `MonotonicClock`.
    #[must_use]
    pub fn with_clock<C: Clock + Send + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.settings.timing = timing;
        self
    }

    #[must_use]
    pub fn with_port(mut self, spec: PortSpec) -> Self {
        self.ports.push(spec);
        self
    }

    #[must_use]
    pub fn with_ports(mut self, specs: impl IntoIterator<Item = PortSpec>) -> Self {
        self.ports.extend(specs);
        self
    }
}

impl<B: PortIo, I, R> PortManagerBuilder<B, I, R> {
    /// Fallible build available in any type-state.
    ///
    /// A port whose pins cannot be floated is left out and recorded in
    /// `PortManager::init_failures`; configuration mistakes (duplicate name,
    /// unknown mode) fail the whole build.
    pub fn try_build(self) -> Result<PortManager<B>> {
        let io = self
            .io
            .ok_or_else(|| eyre::Report::new(BuildError::MissingIo))?;
        let registry = self
            .registry
            .ok_or_else(|| eyre::Report::new(BuildError::MissingRegistry))?;
        self.settings.timing.validate().map_err(eyre::Report::new)?;
        if self.settings.dispatcher.queue_depth == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "queue_depth must be >= 1",
            )));
        }
        let clock = self
            .clock
            .unwrap_or_else(|| Box::new(MonotonicClock::new()));

        let mut manager = PortManager::new(io, registry, clock, &self.settings);
        for spec in &self.ports {
            match manager.add_port(spec) {
                Ok(()) => {}
                Err(e @ crate::error::PortError::ResourceUnavailable { .. }) => {
                    tracing::error!(port = %spec.name, error = %e, "port unavailable");
                    manager.record_init_failure(e);
                }
                Err(e) => return Err(eyre::Report::new(e)),
            }
        }
        Ok(manager)
    }
}

impl<B: PortIo> PortManagerBuilder<B, Set, Set> {
    pub fn build(self) -> Result<PortManager<B>> {
        self.try_build()
    }
}
