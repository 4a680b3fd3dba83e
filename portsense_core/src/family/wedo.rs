//! WeDo hub port: one identifier byte, one table, no probe.
use portsense_traits::{BoxError, Channel};

use super::{Decision, Detector, Observation, PortIo, Presence, References, Sample};
use crate::tables::classify_wedo_id;
use crate::types::PortKind;

#[derive(Debug, Default, Clone, Copy)]
pub struct WeDo;

impl Detector for WeDo {
    fn kind(&self) -> PortKind {
        PortKind::WeDo
    }

    // The hub owns the pins.
    fn float(&self, _io: &mut dyn PortIo, _port: u8) -> Result<(), BoxError> {
        Ok(())
    }

    fn sample(&self, io: &mut dyn PortIo, port: u8) -> Result<Sample, BoxError> {
        let id = io.read_voltage(port, Channel::Id)?;
        Ok(Sample {
            observation: Observation::Id(classify_wedo_id(id)),
            mv: id,
        })
    }

    fn on_stable(
        &self,
        sample: &Sample,
        refs: &mut References,
        _io: &mut dyn PortIo,
        _port: u8,
    ) -> Result<Decision, BoxError> {
        refs.float_mv = Some(sample.mv);
        let device = classify_wedo_id(sample.mv);
        Ok(Decision::Classified {
            device,
            presence: Presence::Id(device),
        })
    }

    fn raw_channels(&self) -> &'static [Channel] {
        &[Channel::Id]
    }
}
