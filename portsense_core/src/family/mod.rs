//! Per-family electrical knowledge.
//!
//! A `Detector` knows how to float a port, take one passive sample, turn a
//! stable sample into a verdict (possibly via an active probe) and check
//! whether a detected device is still there. The port state machine owns
//! timing and debounce; detectors never count ticks.
use portsense_traits::{BoxError, Channel, Pin, PinDriver, SignalSource};

use crate::flags::PinFlags;
use crate::tables;
use crate::types::{DeviceType, PortKind, Probe};

pub mod ev3_input;
pub mod ev3_output;
pub mod mux;
pub mod wedo;

/// Signal source and pin driver in one object.
pub trait PortIo: SignalSource + PinDriver {}

impl<T: SignalSource + PinDriver + ?Sized> PortIo for T {}

/// What the debounce logic compares tick to tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Observation {
    Flags(PinFlags),
    Id(DeviceType),
}

impl Observation {
    /// Nothing plugged in.
    pub fn is_baseline(self) -> bool {
        match self {
            Observation::Flags(f) => f.is_empty(),
            Observation::Id(t) => t == DeviceType::None,
        }
    }
}

/// One passive sample: the debounced observation plus the primary analog
/// reading it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub observation: Observation,
    pub mv: i32,
}

impl Sample {
    pub fn flags(&self) -> PinFlags {
        match self.observation {
            Observation::Flags(f) => f,
            Observation::Id(_) => PinFlags::empty(),
        }
    }
}

/// Reference readings latched while classifying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct References {
    pub flags: PinFlags,
    pub float_mv: Option<i32>,
    pub low_mv: Option<i32>,
    pub high_mv: Option<i32>,
}

impl References {
    pub fn probe_data(&self) -> portsense_traits::ProbeData {
        portsense_traits::ProbeData {
            float_mv: self.float_mv,
            low_mv: self.low_mv,
            high_mv: self.high_mv,
        }
    }
}

/// The condition that keeps a detected device counted as present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presence {
    Pin2Low,
    #[default]
    Pin1Loaded,
    Pin6High,
    Pin5Low,
    /// Output port: pin6 high or pin5 outside the balance band.
    Pin6HighOrPin5Loaded,
    Id(DeviceType),
}

impl Presence {
    pub fn check(self, io: &mut dyn PortIo, port: u8) -> Result<bool, BoxError> {
        Ok(match self {
            Presence::Pin2Low => !io.read_digital(port, Pin::P2)?,
            Presence::Pin1Loaded => io.read_voltage(port, Channel::Pin1)? < tables::PIN1_NEAR_5V,
            Presence::Pin6High => io.read_digital(port, Pin::P6)?,
            Presence::Pin5Low => !io.read_digital(port, Pin::P5)?,
            Presence::Pin6HighOrPin5Loaded => {
                io.read_digital(port, Pin::P6)?
                    || !tables::PIN5_BALANCE.contains(io.read_voltage(port, Channel::Pin5)?)
            }
            Presence::Id(t) => tables::classify_wedo_id(io.read_voltage(port, Channel::Id)?) == t,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Drive the port into `Probe` and come back after the settle wait.
    Probe(Probe),
    Classified {
        device: DeviceType,
        presence: Presence,
    },
}

pub trait Detector: Send {
    fn kind(&self) -> PortKind;

    /// Put every pin into its passive state.
    fn float(&self, io: &mut dyn PortIo, port: u8) -> Result<(), BoxError>;

    fn sample(&self, io: &mut dyn PortIo, port: u8) -> Result<Sample, BoxError>;

    /// A non-baseline sample held stable for the add threshold.
    fn on_stable(
        &self,
        sample: &Sample,
        refs: &mut References,
        io: &mut dyn PortIo,
        port: u8,
    ) -> Result<Decision, BoxError>;

    /// Settle wait for `probe` elapsed.
    fn on_probe_settled(
        &self,
        probe: Probe,
        refs: &mut References,
        io: &mut dyn PortIo,
        port: u8,
    ) -> Result<Decision, BoxError> {
        let _ = (refs, io, port);
        tracing::warn!(probe = probe.name(), kind = %self.kind(), "probe not used by this family");
        Ok(Decision::Classified {
            device: DeviceType::Error,
            presence: Presence::Pin1Loaded,
        })
    }

    /// Analog channels worth showing in raw mode.
    fn raw_channels(&self) -> &'static [Channel];
}

pub fn detector_for(kind: PortKind) -> Box<dyn Detector> {
    match kind {
        PortKind::Ev3Input => Box::new(ev3_input::Ev3Input),
        PortKind::Ev3Output => Box::new(ev3_output::Ev3Output),
        PortKind::WeDo => Box::new(wedo::WeDo),
        PortKind::HtSmux | PortKind::MsEv3Smux => Box::new(mux::Mux(kind)),
    }
}
