//! Per-port connection state machine.
//!
//! One `tick` performs at most one transition. Registry work is never done
//! inline: the port asks the `Dispatcher` for a job and records the returned
//! `Ticket` in `pending`; the outcome comes back through `apply`, the only
//! place that changes `device`.
use portsense_traits::{BoxError, Channel};

use crate::config::Timing;
use crate::debounce::{Debounce, TickCounter};
use crate::dispatcher::{Completion, Device, Dispatcher, Outcome, Ticket};
use crate::error::PortError;
use crate::events::PortEvent;
use crate::family::{self, Decision, Detector, Observation, PortIo, Presence, References};
use crate::hw_error::map_hw_error;
use crate::status::PortStatus;
use crate::types::{ConnectionState, DeviceType, Mode, PortId, PortKind};

pub struct Port {
    pub(crate) slot: usize,
    pub(crate) id: PortId,
    pub(crate) kind: PortKind,
    detector: Box<dyn Detector>,
    pub(crate) mode: Mode,
    pub(crate) state: ConnectionState,
    settle: TickCounter,
    observed: Debounce<Observation>,
    absent: Debounce<bool>,
    pub(crate) refs: References,
    presence: Presence,
    pub(crate) device_type: DeviceType,
    pub(crate) device: Option<Device>,
    pub(crate) pending: Option<Ticket>,
    faulted: bool,
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("device_type", &self.device_type)
            .field("device", &self.device)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl Port {
    pub(crate) fn new(slot: usize, id: PortId, kind: PortKind) -> Self {
        Self {
            slot,
            id,
            kind,
            detector: family::detector_for(kind),
            mode: Mode::Auto,
            state: ConnectionState::Init,
            settle: TickCounter::default(),
            observed: Debounce::new(),
            absent: Debounce::new(),
            refs: References::default(),
            presence: Presence::default(),
            device_type: DeviceType::None,
            device: None,
            pending: None,
            faulted: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn status(&self) -> PortStatus {
        PortStatus {
            name: self.id.name.clone(),
            kind: self.kind,
            mode: self.mode.name(self.kind).unwrap_or("?"),
            state: self.state,
            device: self.device_type,
            handle: self.device.as_ref().map(|d| d.handle),
            pending: self.pending.is_some(),
        }
    }

    fn set_state(&mut self, to: ConnectionState, events: &mut Vec<PortEvent>) {
        if to == self.state {
            return;
        }
        tracing::debug!(port = %self.id, from = %self.state, to = %to, "state");
        events.push(PortEvent::StateChanged {
            port: self.id.name.clone(),
            from: self.state,
            to,
        });
        self.state = to;
        self.settle.reset();
    }

    fn note_fault(&mut self, e: &BoxError) {
        if self.faulted {
            tracing::trace!(port = %self.id, error = %e, "read still failing");
        } else {
            tracing::warn!(port = %self.id, error = %e, "signal read failed; holding state");
            self.faulted = true;
        }
    }

    fn clear_fault(&mut self) {
        if self.faulted {
            tracing::info!(port = %self.id, "signal reads recovered");
            self.faulted = false;
        }
    }

    /// Put every pin back into its passive state.
    pub(crate) fn float(&mut self, io: &mut dyn PortIo) -> Result<(), PortError> {
        self.detector
            .float(io, self.id.index)
            .map_err(|e| map_hw_error(&self.id.name, e.as_ref()))
    }

    /// Current readings of the channels meaningful for this port kind.
    pub(crate) fn raw_sample(&self, io: &mut dyn PortIo) -> Result<Vec<(Channel, i32)>, PortError> {
        self.detector
            .raw_channels()
            .iter()
            .map(|&ch| {
                io.read_voltage(self.id.index, ch)
                    .map(|mv| (ch, mv))
                    .map_err(|e| map_hw_error(&self.id.name, e.as_ref()))
            })
            .collect()
    }

    /// Advance the state machine by one tick.
    pub(crate) fn tick(
        &mut self,
        io: &mut dyn PortIo,
        dispatcher: &mut Dispatcher,
        timing: &Timing,
        events: &mut Vec<PortEvent>,
    ) {
        if self.mode != Mode::Auto {
            return;
        }
        let idx = self.id.index;
        match self.state {
            ConnectionState::Init => {
                if self.pending.is_some() {
                    return;
                }
                if self.device.is_some() {
                    // Left over from before a restart of the machine.
                    self.request_detach(dispatcher, events);
                    return;
                }
                if let Err(e) = self.detector.float(io, idx) {
                    self.note_fault(&e);
                    return;
                }
                self.clear_fault();
                self.device_type = DeviceType::None;
                self.refs = References::default();
                self.set_state(ConnectionState::InitSettle, events);
            }
            ConnectionState::InitSettle => {
                if self.settle.advance() >= timing.settle_ticks {
                    self.observed.reset();
                    self.set_state(ConnectionState::NoDevice, events);
                }
            }
            ConnectionState::NoDevice => {
                let sample = match self.detector.sample(io, idx) {
                    Ok(s) => {
                        self.clear_fault();
                        s
                    }
                    Err(e) => {
                        self.note_fault(&e);
                        self.observed.reset();
                        return;
                    }
                };
                let stable = self.observed.observe(sample.observation);
                if sample.observation.is_baseline()
                    || stable < timing.add_ticks
                    || self.pending.is_some()
                {
                    return;
                }
                match self.detector.on_stable(&sample, &mut self.refs, io, idx) {
                    Ok(d) => self.decide(d, events),
                    Err(e) => {
                        self.note_fault(&e);
                        self.observed.reset();
                    }
                }
            }
            ConnectionState::Probing(probe) => {
                if self.settle.advance() < timing.settle_ticks {
                    return;
                }
                match self.detector.on_probe_settled(probe, &mut self.refs, io, idx) {
                    Ok(d) => {
                        self.clear_fault();
                        self.decide(d, events);
                    }
                    // Retried next tick; the settle count is already met.
                    Err(e) => self.note_fault(&e),
                }
            }
            ConnectionState::Connected => self.on_connected(dispatcher, events),
            ConnectionState::WaitingForDisconnect => {
                let present = match self.presence.check(io, idx) {
                    Ok(p) => {
                        self.clear_fault();
                        p
                    }
                    Err(e) => {
                        self.note_fault(&e);
                        true
                    }
                };
                if present {
                    self.absent.reset();
                    return;
                }
                let gone_for = self.absent.observe(true);
                if gone_for < timing.remove_ticks || self.pending.is_some() {
                    return;
                }
                tracing::info!(port = %self.id, device = %self.device_type, "device removed");
                if self.device.is_some() && !self.request_detach(dispatcher, events) {
                    return;
                }
                self.set_state(ConnectionState::Init, events);
            }
        }
    }

    fn decide(&mut self, decision: Decision, events: &mut Vec<PortEvent>) {
        match decision {
            Decision::Probe(p) => self.set_state(ConnectionState::Probing(p), events),
            Decision::Classified { device, presence } => {
                tracing::info!(port = %self.id, device = %device, "classified");
                self.device_type = device;
                self.presence = presence;
                self.absent.reset();
                events.push(PortEvent::Classified {
                    port: self.id.name.clone(),
                    device,
                });
                self.set_state(ConnectionState::Connected, events);
            }
        }
    }

    fn on_connected(&mut self, dispatcher: &mut Dispatcher, events: &mut Vec<PortEvent>) {
        if self.device_type == DeviceType::Error {
            let error = PortError::ClassificationAmbiguous {
                port: self.id.name.clone(),
                detail: format!(
                    "flags {:?}, float {:?} mV, low {:?} mV, high {:?} mV",
                    self.refs.flags, self.refs.float_mv, self.refs.low_mv, self.refs.high_mv
                ),
            };
            tracing::warn!(port = %self.id, %error, "unrecognized device");
            events.push(PortEvent::Fault {
                port: self.id.name.clone(),
                error,
            });
            self.set_state(ConnectionState::WaitingForDisconnect, events);
            return;
        }
        match dispatcher.schedule_attach(self) {
            Ok(true) => {
                events.push(PortEvent::AttachScheduled {
                    port: self.id.name.clone(),
                    device: self.device_type,
                });
                self.set_state(ConnectionState::WaitingForDisconnect, events);
            }
            // Queue full; try again next tick.
            Ok(false) => {}
            Err(error) => {
                tracing::warn!(port = %self.id, %error, "attach not possible");
                events.push(PortEvent::Fault {
                    port: self.id.name.clone(),
                    error,
                });
                self.set_state(ConnectionState::WaitingForDisconnect, events);
            }
        }
    }

    /// Queue a detach of the current device. False if it could not be queued.
    fn request_detach(&mut self, dispatcher: &mut Dispatcher, events: &mut Vec<PortEvent>) -> bool {
        match dispatcher.schedule_detach(self) {
            Ok(true) => {
                events.push(PortEvent::DetachScheduled {
                    port: self.id.name.clone(),
                });
                true
            }
            Ok(false) => false,
            Err(error) => {
                tracing::error!(port = %self.id, %error, "detach not possible");
                false
            }
        }
    }

    /// Apply a dispatcher outcome for this port.
    pub(crate) fn apply(&mut self, completion: Completion, events: &mut Vec<PortEvent>) {
        if self.pending.as_ref().is_some_and(|t| t.id == completion.ticket) {
            self.pending = None;
        } else if let Some(t) = &self.pending {
            tracing::debug!(
                port = %self.id,
                ticket = completion.ticket,
                pending = t.id,
                "completion for a superseded ticket"
            );
        }
        let port = self.id.name.clone();
        match completion.outcome {
            Outcome::Attached(device) => {
                events.push(PortEvent::Attached {
                    port,
                    device: device.device_type,
                    handle: device.handle,
                });
                self.device = Some(device);
            }
            Outcome::AttachFailed(error) => {
                events.push(PortEvent::Fault { port, error });
            }
            Outcome::Detached(device) => {
                events.push(PortEvent::Detached {
                    port,
                    device: device.device_type,
                });
                if self.device.as_ref().is_some_and(|d| d.handle == device.handle) {
                    self.device = None;
                }
                if self.mode == Mode::Auto {
                    self.device_type = DeviceType::None;
                }
            }
            Outcome::Cancelled => {
                tracing::debug!(port = %self.id, ticket = completion.ticket, "job cancelled");
            }
        }
    }

    /// Cancel any in-flight job and wait for its outcome.
    pub(crate) fn settle_pending(&mut self, dispatcher: &mut Dispatcher, events: &mut Vec<PortEvent>) {
        if let Some(ticket) = self.pending.clone() {
            match dispatcher.cancel(&ticket) {
                Some(c) => self.apply(c, events),
                None => self.pending = None,
            }
        }
    }

    /// Synchronously unregister the current device, if any.
    pub(crate) fn detach_now(
        &mut self,
        dispatcher: &mut Dispatcher,
        events: &mut Vec<PortEvent>,
    ) -> Result<(), PortError> {
        self.settle_pending(dispatcher, events);
        if !dispatcher.schedule_detach_blocking(self)? {
            return Ok(());
        }
        events.push(PortEvent::DetachScheduled {
            port: self.id.name.clone(),
        });
        let Some(ticket) = self.pending.clone() else {
            return Ok(());
        };
        match dispatcher.await_ticket(ticket.id) {
            Some(c) => {
                self.apply(c, events);
                Ok(())
            }
            None => {
                self.pending = None;
                Err(PortError::DispatcherStopped)
            }
        }
    }

    /// Switch operating mode. Any in-flight job is cancelled and any
    /// attached device is detached before the new mode takes effect.
    pub(crate) fn set_mode(
        &mut self,
        mode: Mode,
        io: &mut dyn PortIo,
        dispatcher: &mut Dispatcher,
        events: &mut Vec<PortEvent>,
    ) -> Result<(), PortError> {
        if mode == self.mode {
            return Ok(());
        }
        self.detach_now(dispatcher, events)?;

        tracing::info!(
            port = %self.id,
            from = self.mode.name(self.kind).unwrap_or("?"),
            to = mode.name(self.kind).unwrap_or("?"),
            "mode change"
        );
        self.mode = mode;
        self.refs = References::default();
        self.observed.reset();
        self.absent.reset();
        self.clear_fault();
        events.push(PortEvent::ModeChanged {
            port: self.id.name.clone(),
            mode,
        });
        self.set_state(ConnectionState::Init, events);

        match mode {
            Mode::Auto => {
                self.device_type = DeviceType::None;
                Ok(())
            }
            Mode::Forced(t) => {
                self.float(io)?;
                self.device_type = t;
                if dispatcher.schedule_attach_blocking(self)? {
                    events.push(PortEvent::AttachScheduled {
                        port: self.id.name.clone(),
                        device: t,
                    });
                }
                Ok(())
            }
            Mode::Raw | Mode::OtherUart => {
                self.device_type = DeviceType::None;
                self.float(io)
            }
        }
    }

    /// Cancel work, detach and float. Used when the manager shuts down.
    pub(crate) fn teardown(
        &mut self,
        io: &mut dyn PortIo,
        dispatcher: &mut Dispatcher,
        events: &mut Vec<PortEvent>,
    ) {
        if let Err(error) = self.detach_now(dispatcher, events) {
            tracing::warn!(port = %self.id, %error, "detach during teardown failed");
        }
        if let Err(error) = self.float(io) {
            tracing::warn!(port = %self.id, %error, "float during teardown failed");
        }
        self.device_type = DeviceType::None;
        self.set_state(ConnectionState::Init, events);
    }
}
