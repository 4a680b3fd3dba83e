//! EV3 input port: digital flags pick the family, pin1 picks the device.
use portsense_traits::{BoxError, Channel, Direction, Pin};

use super::{Decision, Detector, Observation, PortIo, Presence, References, Sample};
use crate::flags::PinFlags;
use crate::tables::{self, PIN1_NEAR_5V, PIN1_NEAR_GND, PIN1_TOUCH, PIN1_TOUCH_VAR};
use crate::types::{DeviceType, PortKind, Probe};

#[derive(Debug, Default, Clone, Copy)]
pub struct Ev3Input;

fn classified(device: DeviceType, presence: Presence) -> Decision {
    Decision::Classified { device, presence }
}

/// NXT family (pin2 low). Pin5/pin6 are authoritative over pin1.
fn classify_nxt(flags: PinFlags, pin1: i32) -> Decision {
    let p = Presence::Pin2Low;
    let pin5_low = flags.contains(PinFlags::PIN5_LOW);
    let pin6_high = flags.contains(PinFlags::PIN6_HIGH);
    if !pin5_low && pin6_high {
        if pin1 < PIN1_NEAR_GND {
            return classified(DeviceType::NxtColor, p);
        }
        return classified(DeviceType::NxtI2c, p);
    }
    if pin5_low {
        if pin6_high {
            return classified(DeviceType::NxtAnalog, p);
        }
        return classified(DeviceType::NxtLight, p);
    }
    if pin1 < PIN1_NEAR_GND {
        return classified(DeviceType::NxtColor, p);
    }
    if pin1 > PIN1_NEAR_5V {
        return classified(DeviceType::NxtTouch, p);
    }
    if PIN1_TOUCH.contains(pin1) {
        return Decision::Probe(Probe::NxtTouchRecheck);
    }
    classified(DeviceType::NxtAnalog, p)
}

impl Detector for Ev3Input {
    fn kind(&self) -> PortKind {
        PortKind::Ev3Input
    }

    fn float(&self, io: &mut dyn PortIo, port: u8) -> Result<(), BoxError> {
        io.set_direction(port, Pin::P1, Direction::Output)?;
        io.set_level(port, Pin::P1, false)?;
        io.set_direction(port, Pin::P2, Direction::Input)?;
        io.set_direction(port, Pin::P5, Direction::Input)?;
        io.set_direction(port, Pin::P6, Direction::Input)?;
        Ok(())
    }

    fn sample(&self, io: &mut dyn PortIo, port: u8) -> Result<Sample, BoxError> {
        let pin1 = io.read_voltage(port, Channel::Pin1)?;
        let mut flags = PinFlags::empty();
        if !io.read_digital(port, Pin::P2)? {
            flags |= PinFlags::PIN2_LOW;
        }
        if pin1 < PIN1_NEAR_5V {
            flags |= PinFlags::PIN1_LOADED;
        }
        if !io.read_digital(port, Pin::P5)? {
            flags |= PinFlags::PIN5_LOW;
        }
        if io.read_digital(port, Pin::P6)? {
            flags |= PinFlags::PIN6_HIGH;
        }
        Ok(Sample {
            observation: Observation::Flags(flags),
            mv: pin1,
        })
    }

    fn on_stable(
        &self,
        sample: &Sample,
        refs: &mut References,
        _io: &mut dyn PortIo,
        _port: u8,
    ) -> Result<Decision, BoxError> {
        let flags = sample.flags();
        let pin1 = sample.mv;
        refs.flags = flags;
        refs.float_mv = Some(pin1);

        if flags.contains(PinFlags::PIN2_LOW) {
            return Ok(classify_nxt(flags, pin1));
        }
        if flags.contains(PinFlags::PIN1_LOADED) {
            return Ok(classified(
                tables::classify_ev3_pin1(pin1),
                Presence::Pin1Loaded,
            ));
        }
        if flags.contains(PinFlags::PIN6_HIGH) {
            return Ok(classified(DeviceType::NxtI2c, Presence::Pin6High));
        }
        // pin5 low on its own matches nothing we know
        Ok(classified(DeviceType::Error, Presence::Pin5Low))
    }

    fn on_probe_settled(
        &self,
        probe: Probe,
        refs: &mut References,
        io: &mut dyn PortIo,
        port: u8,
    ) -> Result<Decision, BoxError> {
        if probe != Probe::NxtTouchRecheck {
            return Ok(classified(DeviceType::Error, Presence::Pin2Low));
        }
        let now = io.read_voltage(port, Channel::Pin1)?;
        refs.low_mv = Some(now);
        let first = refs.float_mv.unwrap_or(now);
        // A touch sensor holds its level; an analog sensor wanders.
        let device = if (now - first).abs() < PIN1_TOUCH_VAR {
            DeviceType::NxtTouch
        } else {
            DeviceType::NxtAnalog
        };
        Ok(classified(device, Presence::Pin2Low))
    }

    fn raw_channels(&self) -> &'static [Channel] {
        &[Channel::Pin1, Channel::Pin6]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PinFlags::PIN2_LOW | PinFlags::PIN6_HIGH, 40, DeviceType::NxtColor)]
    #[case(PinFlags::PIN2_LOW | PinFlags::PIN6_HIGH, 5000, DeviceType::NxtI2c)]
    #[case(PinFlags::PIN2_LOW | PinFlags::PIN5_LOW | PinFlags::PIN6_HIGH, 2000, DeviceType::NxtAnalog)]
    #[case(PinFlags::PIN2_LOW | PinFlags::PIN5_LOW, 2000, DeviceType::NxtLight)]
    #[case(PinFlags::PIN2_LOW, 20, DeviceType::NxtColor)]
    #[case(PinFlags::PIN2_LOW, 4950, DeviceType::NxtTouch)]
    #[case(PinFlags::PIN2_LOW, 3000, DeviceType::NxtAnalog)]
    fn nxt_branches(#[case] flags: PinFlags, #[case] pin1: i32, #[case] expected: DeviceType) {
        assert_eq!(
            classify_nxt(flags, pin1),
            Decision::Classified {
                device: expected,
                presence: Presence::Pin2Low
            }
        );
    }

    #[test]
    fn touch_window_needs_recheck() {
        assert_eq!(
            classify_nxt(PinFlags::PIN2_LOW, 900),
            Decision::Probe(Probe::NxtTouchRecheck)
        );
    }
}
