//! EV3 output port: compare pin5 floating against pin5 with pin6 pulled low.
use portsense_traits::{BoxError, Channel, Direction, Pin};

use super::{Decision, Detector, Observation, PortIo, Presence, References, Sample};
use crate::flags::PinFlags;
use crate::tables::{ADC_REF, OUTPUT_FLOAT, OUTPUT_PIN5_HIGH, OutputClass, PIN5_BALANCE, REF_TOLERANCE};
use crate::types::{DeviceType, PortKind, Probe};

#[derive(Debug, Default, Clone, Copy)]
pub struct Ev3Output;

/// Verdict from the float/low reference pair. `None` means the pin5-high
/// probe is needed.
pub fn classify_references(flags: PinFlags, float_mv: i32, low_mv: i32) -> Option<DeviceType> {
    let delta = ADC_REF + float_mv - low_mv;
    if (delta - ADC_REF).abs() >= REF_TOLERANCE {
        // references differ: new actuator or unknown
        return Some(DeviceType::Error);
    }
    match OUTPUT_FLOAT.lookup(float_mv) {
        Some(OutputClass::Device(t)) => Some(t),
        Some(OutputClass::Balance) if flags.contains(PinFlags::PIN6_HIGH) => {
            // NXT touch/sound or a UART sensor
            Some(DeviceType::Error)
        }
        Some(OutputClass::Balance | OutputClass::Probe) => None,
        None => Some(DeviceType::Error),
    }
}

fn verdict(device: DeviceType) -> Decision {
    Decision::Classified {
        device,
        presence: Presence::Pin6HighOrPin5Loaded,
    }
}

impl Detector for Ev3Output {
    fn kind(&self) -> PortKind {
        PortKind::Ev3Output
    }

    fn float(&self, io: &mut dyn PortIo, port: u8) -> Result<(), BoxError> {
        io.set_direction(port, Pin::P1, Direction::Output)?;
        io.set_level(port, Pin::P1, false)?;
        io.set_direction(port, Pin::P2, Direction::Output)?;
        io.set_level(port, Pin::P2, false)?;
        io.set_direction(port, Pin::P5, Direction::Input)?;
        io.set_direction(port, Pin::P6, Direction::Input)?;
        Ok(())
    }

    fn sample(&self, io: &mut dyn PortIo, port: u8) -> Result<Sample, BoxError> {
        let pin5 = io.read_voltage(port, Channel::Pin5)?;
        let mut flags = PinFlags::empty();
        if io.read_digital(port, Pin::P6)? {
            flags |= PinFlags::PIN6_HIGH;
        }
        if !PIN5_BALANCE.contains(pin5) {
            flags |= PinFlags::PIN5_LOADED;
        }
        Ok(Sample {
            observation: Observation::Flags(flags),
            mv: pin5,
        })
    }

    fn on_stable(
        &self,
        sample: &Sample,
        refs: &mut References,
        io: &mut dyn PortIo,
        port: u8,
    ) -> Result<Decision, BoxError> {
        refs.flags = sample.flags();
        refs.float_mv = Some(sample.mv);
        io.set_direction(port, Pin::P6, Direction::Output)?;
        io.set_level(port, Pin::P6, false)?;
        Ok(Decision::Probe(Probe::Pin6Low))
    }

    fn on_probe_settled(
        &self,
        probe: Probe,
        refs: &mut References,
        io: &mut dyn PortIo,
        port: u8,
    ) -> Result<Decision, BoxError> {
        let pin5 = io.read_voltage(port, Channel::Pin5)?;
        match probe {
            Probe::Pin6Low => {
                refs.low_mv = Some(pin5);
                io.set_direction(port, Pin::P6, Direction::Input)?;
                let float = refs.float_mv.unwrap_or(pin5);
                match classify_references(refs.flags, float, pin5) {
                    Some(t) => Ok(verdict(t)),
                    None => {
                        io.set_direction(port, Pin::P5, Direction::Output)?;
                        io.set_level(port, Pin::P5, true)?;
                        Ok(Decision::Probe(Probe::Pin5High))
                    }
                }
            }
            Probe::Pin5High => {
                refs.high_mv = Some(pin5);
                io.set_direction(port, Pin::P5, Direction::Input)?;
                Ok(verdict(OUTPUT_PIN5_HIGH.lookup(pin5).unwrap_or(DeviceType::Error)))
            }
            Probe::NxtTouchRecheck => Ok(verdict(DeviceType::Error)),
        }
    }

    fn raw_channels(&self) -> &'static [Channel] {
        &[Channel::Pin5]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PinFlags::PIN5_LOADED, 180, 180, Some(DeviceType::Tacho))]
    #[case(PinFlags::PIN5_LOADED, 350, 360, Some(DeviceType::MiniTacho))]
    #[case(PinFlags::PIN5_LOADED, 1200, 1200, Some(DeviceType::NewTacho))]
    #[case(PinFlags::PIN5_LOADED, 50, 50, Some(DeviceType::Error))]
    #[case(PinFlags::PIN5_LOADED, 700, 700, Some(DeviceType::Error))]
    #[case(PinFlags::PIN5_LOADED, 3000, 3000, Some(DeviceType::Error))]
    #[case(PinFlags::PIN6_HIGH, 2500, 2500, Some(DeviceType::Error))]
    #[case(PinFlags::PIN5_LOADED, 1200, 300, Some(DeviceType::Error))]
    #[case(PinFlags::empty(), 2500, 2500, None)]
    #[case(PinFlags::PIN5_LOADED, 4000, 4000, None)]
    fn reference_pairs(
        #[case] flags: PinFlags,
        #[case] float: i32,
        #[case] low: i32,
        #[case] expected: Option<DeviceType>,
    ) {
        assert_eq!(classify_references(flags, float, low), expected);
    }

    #[test]
    fn tolerance_edge_counts_as_different() {
        assert_eq!(
            classify_references(PinFlags::PIN5_LOADED, 200, 150),
            Some(DeviceType::Error)
        );
        assert_eq!(
            classify_references(PinFlags::PIN5_LOADED, 200, 151),
            Some(DeviceType::Tacho)
        );
    }
}
