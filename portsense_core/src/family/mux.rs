//! Sensor multiplexer channel: the multiplexer owns the pins and reports
//! no connection state, so the host is chosen by mode alone.
use portsense_traits::{BoxError, Channel};

use super::{Decision, Detector, Observation, PortIo, Presence, References, Sample};
use crate::flags::PinFlags;
use crate::types::{DeviceType, PortKind};

#[derive(Debug, Clone, Copy)]
pub struct Mux(pub PortKind);

impl Detector for Mux {
    fn kind(&self) -> PortKind {
        self.0
    }

    fn float(&self, _io: &mut dyn PortIo, _port: u8) -> Result<(), BoxError> {
        Ok(())
    }

    fn sample(&self, _io: &mut dyn PortIo, _port: u8) -> Result<Sample, BoxError> {
        Ok(Sample {
            observation: Observation::Flags(PinFlags::empty()),
            mv: 0,
        })
    }

    fn on_stable(
        &self,
        _sample: &Sample,
        _refs: &mut References,
        _io: &mut dyn PortIo,
        _port: u8,
    ) -> Result<Decision, BoxError> {
        Ok(Decision::Classified {
            device: DeviceType::Error,
            presence: Presence::Pin1Loaded,
        })
    }

    fn raw_channels(&self) -> &'static [Channel] {
        &[]
    }
}
