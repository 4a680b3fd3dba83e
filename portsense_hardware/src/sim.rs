//! Simulated connector board.
//!
//! Each port carries a `Wire`: the electrical picture a plugged device
//! presents. Reads reflect the wire plus whatever the core is currently
//! driving, so probe sequences (pin6 forced low, pin5 forced high) see the
//! same shifts they would on a real port.
use portsense_traits::{BoxError, Channel, Direction, Pin, PinDriver, SignalSource};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::error::HwError;

/// Signal levels presented by whatever is plugged into a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wire {
    pub pin1_mv: i32,
    pub pin5_mv: i32,
    pub pin6_mv: i32,
    pub pin2: bool,
    pub pin5: bool,
    pub pin6: bool,
    pub id: u8,
    /// pin5 reading while pin6 is driven low (None: unaffected).
    pub pin5_mv_pin6_low: Option<i32>,
    /// pin5 reading while pin5 is driven high (None: unaffected).
    pub pin5_mv_pin5_high: Option<i32>,
}

impl Wire {
    pub const EV3_INPUT_EMPTY: Wire = Wire {
        pin1_mv: 5000,
        pin5_mv: 0,
        pin6_mv: 0,
        pin2: true,
        pin5: true,
        pin6: false,
        id: 0,
        pin5_mv_pin6_low: None,
        pin5_mv_pin5_high: None,
    };

    pub const EV3_OUTPUT_EMPTY: Wire = Wire {
        pin1_mv: 0,
        pin5_mv: 2500,
        pin6_mv: 0,
        pin2: false,
        pin5: false,
        pin6: false,
        id: 0,
        pin5_mv_pin6_low: None,
        pin5_mv_pin5_high: None,
    };

    /// Hub port with nothing attached reports the "open" identifier.
    pub const WEDO_EMPTY: Wire = Wire {
        id: 230,
        ..Wire::EV3_OUTPUT_EMPTY
    };

    pub fn nxt_touch(pressed: bool) -> Self {
        Self {
            pin2: false,
            pin1_mv: if pressed { 900 } else { 5000 },
            ..Self::EV3_INPUT_EMPTY
        }
    }

    pub fn nxt_light() -> Self {
        Self {
            pin2: false,
            pin5: false,
            pin1_mv: 2100,
            ..Self::EV3_INPUT_EMPTY
        }
    }

    pub fn nxt_analog(pin1_mv: i32) -> Self {
        Self {
            pin2: false,
            pin1_mv,
            ..Self::EV3_INPUT_EMPTY
        }
    }

    pub fn nxt_color() -> Self {
        Self {
            pin2: false,
            pin1_mv: 40,
            ..Self::EV3_INPUT_EMPTY
        }
    }

    pub fn nxt_i2c() -> Self {
        Self {
            pin2: false,
            pin6: true,
            ..Self::EV3_INPUT_EMPTY
        }
    }

    /// EV3 analog sensor identified by its pin1 resistor voltage.
    pub fn ev3_analog(pin1_mv: i32) -> Self {
        Self {
            pin1_mv,
            ..Self::EV3_INPUT_EMPTY
        }
    }

    pub fn ev3_touch() -> Self {
        Self::ev3_analog(417)
    }

    pub fn ev3_uart() -> Self {
        Self::ev3_analog(30)
    }

    /// Output-port device whose pin5 does not move when pin6 is pulled low.
    pub fn output_device(pin5_float_mv: i32) -> Self {
        Self {
            pin5_mv: pin5_float_mv,
            ..Self::EV3_OUTPUT_EMPTY
        }
    }

    pub fn large_motor() -> Self {
        Self::output_device(180)
    }

    pub fn medium_motor() -> Self {
        Self::output_device(350)
    }

    /// Motor that needs the pin5-high probe to be told apart.
    pub fn motor_needing_probe(pin5_float_mv: i32, pin5_high_mv: i32) -> Self {
        Self {
            pin5_mv_pin5_high: Some(pin5_high_mv),
            ..Self::output_device(pin5_float_mv)
        }
    }

    pub fn wedo(id: u8) -> Self {
        Self {
            id,
            ..Self::WEDO_EMPTY
        }
    }
}

fn pin_slot(pin: Pin) -> usize {
    match pin {
        Pin::P1 => 0,
        Pin::P2 => 1,
        Pin::P5 => 2,
        Pin::P6 => 3,
    }
}

#[derive(Debug, Clone)]
struct SimPort {
    wire: Wire,
    baseline: Wire,
    dirs: [Direction; 4],
    levels: [bool; 4],
    fault: bool,
}

impl SimPort {
    fn driven(&self, pin: Pin) -> Option<bool> {
        let i = pin_slot(pin);
        (self.dirs[i] == Direction::Output).then_some(self.levels[i])
    }

    fn voltage(&self, channel: Channel) -> i32 {
        match channel {
            Channel::Pin1 => self.wire.pin1_mv,
            Channel::Pin6 => self.wire.pin6_mv,
            Channel::Id => i32::from(self.wire.id),
            Channel::Pin5 => {
                if self.driven(Pin::P6) == Some(false)
                    && let Some(v) = self.wire.pin5_mv_pin6_low
                {
                    return v;
                }
                if self.driven(Pin::P5) == Some(true)
                    && let Some(v) = self.wire.pin5_mv_pin5_high
                {
                    return v;
                }
                self.wire.pin5_mv
            }
        }
    }

    fn digital(&self, pin: Pin) -> bool {
        if let Some(level) = self.driven(pin) {
            return level;
        }
        match pin {
            Pin::P1 => self.wire.pin1_mv >= 2500,
            Pin::P2 => self.wire.pin2,
            Pin::P5 => self.wire.pin5,
            Pin::P6 => self.wire.pin6,
        }
    }
}

/// Cloneable handle onto a shared simulated board.
#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    ports: Arc<Mutex<BTreeMap<u8, SimPort>>>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire up a port slot; it starts out empty.
    pub fn add_port(&self, index: u8, baseline: Wire) {
        if let Ok(mut ports) = self.ports.lock() {
            ports.insert(
                index,
                SimPort {
                    wire: baseline,
                    baseline,
                    dirs: [Direction::Input; 4],
                    levels: [false; 4],
                    fault: false,
                },
            );
        }
    }

    pub fn plug(&self, index: u8, wire: Wire) {
        self.with_port(index, |p| p.wire = wire);
    }

    pub fn unplug(&self, index: u8) {
        self.with_port(index, |p| p.wire = p.baseline);
    }

    /// Make every read and drive on this port fail until cleared.
    pub fn set_fault(&self, index: u8, fault: bool) {
        self.with_port(index, |p| p.fault = fault);
    }

    pub fn wire(&self, index: u8) -> Option<Wire> {
        self.ports.lock().ok()?.get(&index).map(|p| p.wire)
    }

    pub fn direction(&self, index: u8, pin: Pin) -> Option<Direction> {
        self.ports
            .lock()
            .ok()?
            .get(&index)
            .map(|p| p.dirs[pin_slot(pin)])
    }

    pub fn level(&self, index: u8, pin: Pin) -> Option<bool> {
        self.ports
            .lock()
            .ok()?
            .get(&index)
            .map(|p| p.levels[pin_slot(pin)])
    }

    fn with_port(&self, index: u8, f: impl FnOnce(&mut SimPort)) {
        if let Ok(mut ports) = self.ports.lock()
            && let Some(p) = ports.get_mut(&index)
        {
            f(p);
        }
    }

    fn access<T>(
        &self,
        index: u8,
        f: impl FnOnce(&mut SimPort) -> T,
    ) -> Result<T, HwError> {
        let mut ports = self.ports.lock().map_err(|_| HwError::Poisoned)?;
        let port = ports.get_mut(&index).ok_or(HwError::UnknownPort(index))?;
        if port.fault {
            return Err(HwError::Fault(index));
        }
        Ok(f(port))
    }
}

impl SignalSource for SimBoard {
    fn read_voltage(&mut self, port: u8, channel: Channel) -> Result<i32, BoxError> {
        let mv = self.access(port, |p| p.voltage(channel))?;
        tracing::trace!(port, channel = channel.name(), mv, "sim read");
        Ok(mv)
    }

    fn read_digital(&mut self, port: u8, pin: Pin) -> Result<bool, BoxError> {
        Ok(self.access(port, |p| p.digital(pin))?)
    }
}

impl PinDriver for SimBoard {
    fn set_direction(&mut self, port: u8, pin: Pin, dir: Direction) -> Result<(), BoxError> {
        self.access(port, |p| p.dirs[pin_slot(pin)] = dir)?;
        Ok(())
    }

    fn set_level(&mut self, port: u8, pin: Pin, high: bool) -> Result<(), BoxError> {
        self.access(port, |p| p.levels[pin_slot(pin)] = high)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin6_low_shifts_pin5_reading() {
        let mut board = SimBoard::new();
        board.add_port(0, Wire::EV3_OUTPUT_EMPTY);
        board.plug(
            0,
            Wire {
                pin5_mv_pin6_low: Some(900),
                ..Wire::output_device(3000)
            },
        );
        assert_eq!(board.read_voltage(0, Channel::Pin5).unwrap(), 3000);
        board.set_direction(0, Pin::P6, Direction::Output).unwrap();
        board.set_level(0, Pin::P6, false).unwrap();
        assert_eq!(board.read_voltage(0, Channel::Pin5).unwrap(), 900);
        board.set_direction(0, Pin::P6, Direction::Input).unwrap();
        assert_eq!(board.read_voltage(0, Channel::Pin5).unwrap(), 3000);
    }

    #[test]
    fn unplug_restores_baseline() {
        let board = SimBoard::new();
        board.add_port(2, Wire::EV3_INPUT_EMPTY);
        board.plug(2, Wire::nxt_color());
        board.unplug(2);
        assert_eq!(board.wire(2), Some(Wire::EV3_INPUT_EMPTY));
    }
}
