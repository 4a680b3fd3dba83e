//! Real port backend: rppal GPIO for the digital pins, IIO sysfs for the ADC.
use portsense_traits::{BoxError, Channel, Direction, Pin, PinDriver, SignalSource};
use rppal::gpio::{Gpio, IoPin, Level, Mode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{HwError, Result};

/// How one connector is wired to the SoC.
#[derive(Debug, Clone, Default)]
pub struct PortWiring {
    pub index: u8,
    /// BCM line per connector pin.
    pub gpio: Vec<(Pin, u8)>,
    /// IIO voltage channel per analog channel.
    pub adc: Vec<(Channel, u32)>,
}

/// Reads `in_voltageN_raw` scaled by `in_voltage_scale` (mV per LSB).
struct IioAdc {
    dir: PathBuf,
    scale_mv: f64,
}

impl IioAdc {
    fn open(dir: &Path) -> Result<Self> {
        let scale_path = dir.join("in_voltage_scale");
        let text = std::fs::read_to_string(&scale_path)?;
        let scale_mv = text
            .trim()
            .parse::<f64>()
            .map_err(|e| HwError::Adc(format!("{}: {e}", scale_path.display())))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            scale_mv,
        })
    }

    fn read_mv(&self, channel: u32) -> Result<i32> {
        let path = self.dir.join(format!("in_voltage{channel}_raw"));
        let raw = std::fs::read_to_string(&path)?
            .trim()
            .parse::<i64>()
            .map_err(|e| HwError::Adc(format!("{}: {e}", path.display())))?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let mv = (raw as f64 * self.scale_mv).round() as i32;
        Ok(mv)
    }
}

pub struct GpioBoard {
    pins: HashMap<(u8, Pin), IoPin>,
    channels: HashMap<(u8, Channel), u32>,
    adc: IioAdc,
}

impl GpioBoard {
    pub fn new(wiring: &[PortWiring], iio_dir: &Path) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))?;
        let mut pins = HashMap::new();
        let mut channels = HashMap::new();
        for w in wiring {
            for (pin, bcm) in &w.gpio {
                let line = gpio
                    .get(*bcm)
                    .map_err(|e| HwError::Gpio(format!("port {} {}: {e}", w.index, pin.name())))?
                    .into_io(Mode::Input);
                pins.insert((w.index, *pin), line);
            }
            for (ch, n) in &w.adc {
                channels.insert((w.index, *ch), *n);
            }
        }
        let adc = IioAdc::open(iio_dir)?;
        tracing::info!(ports = wiring.len(), "gpio board ready");
        Ok(Self {
            pins,
            channels,
            adc,
        })
    }

    fn line(&mut self, port: u8, pin: Pin) -> Result<&mut IoPin> {
        self.pins.get_mut(&(port, pin)).ok_or(HwError::UnknownPort(port))
    }
}

impl SignalSource for GpioBoard {
    fn read_voltage(&mut self, port: u8, channel: Channel) -> std::result::Result<i32, BoxError> {
        let n = *self
            .channels
            .get(&(port, channel))
            .ok_or(HwError::UnknownPort(port))?;
        Ok(self.adc.read_mv(n)?)
    }

    fn read_digital(&mut self, port: u8, pin: Pin) -> std::result::Result<bool, BoxError> {
        Ok(self.line(port, pin)?.read() == Level::High)
    }
}

impl PinDriver for GpioBoard {
    fn set_direction(
        &mut self,
        port: u8,
        pin: Pin,
        dir: Direction,
    ) -> std::result::Result<(), BoxError> {
        let mode = match dir {
            Direction::Input => Mode::Input,
            Direction::Output => Mode::Output,
        };
        self.line(port, pin)?.set_mode(mode);
        Ok(())
    }

    fn set_level(&mut self, port: u8, pin: Pin, high: bool) -> std::result::Result<(), BoxError> {
        let level = if high { Level::High } else { Level::Low };
        self.line(port, pin)?.write(level);
        Ok(())
    }
}
