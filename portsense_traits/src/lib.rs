//! Collaborator traits for port identification.
//!
//! The core never touches hardware directly. Analog/digital sampling goes
//! through `SignalSource`, pin probing through `PinDriver`, and the logical
//! device objects are created and destroyed through `DeviceRegistry`.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connector pins that can be read or driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pin {
    P1,
    P2,
    P5,
    P6,
}

impl Pin {
    pub const ALL: [Pin; 4] = [Pin::P1, Pin::P2, Pin::P5, Pin::P6];

    pub fn name(self) -> &'static str {
        match self {
            Pin::P1 => "pin1",
            Pin::P2 => "pin2",
            Pin::P5 => "pin5",
            Pin::P6 => "pin6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Input,
    Output,
}

/// Analog channels exposed by the sampling subsystem.
///
/// `Id` is the raw identifier byte reported by hub-style ports; its
/// "voltage" is the byte value 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Pin1,
    Pin5,
    Pin6,
    Id,
}

impl Channel {
    pub fn name(self) -> &'static str {
        match self {
            Channel::Pin1 => "pin1_mv",
            Channel::Pin5 => "pin5_mv",
            Channel::Pin6 => "pin6_mv",
            Channel::Id => "id",
        }
    }
}

/// Last sampled values. Implementations must not block.
pub trait SignalSource {
    fn read_voltage(&mut self, port: u8, channel: Channel) -> Result<i32, BoxError>;
    fn read_digital(&mut self, port: u8, pin: Pin) -> Result<bool, BoxError>;
}

/// Pin direction/level control. Implementations must not block.
pub trait PinDriver {
    fn set_direction(&mut self, port: u8, pin: Pin, dir: Direction) -> Result<(), BoxError>;
    fn set_level(&mut self, port: u8, pin: Pin, high: bool) -> Result<(), BoxError>;
}

/// Opaque handle returned by a registry for a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(pub u64);

/// Reference samples captured while classifying, handed to the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeData {
    pub float_mv: Option<i32>,
    pub low_mv: Option<i32>,
    pub high_mv: Option<i32>,
}

/// Everything a registry needs to bring up a device on a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Host driver name, e.g. `nxt-analog-host`.
    pub driver: String,
    /// Detected device class name.
    pub device: String,
    /// Port name the device is bound to.
    pub port: String,
    /// Initial sensor/motor variant for drivers that host several.
    pub variant: Option<String>,
    pub probe: ProbeData,
}

/// Creates and destroys logical devices. Runs off the sampling thread and
/// may block.
pub trait DeviceRegistry: Send {
    fn register(&mut self, spec: &DeviceSpec) -> Result<DeviceHandle, BoxError>;
    fn unregister(&mut self, handle: DeviceHandle) -> Result<(), BoxError>;
}

impl<T: DeviceRegistry + ?Sized> DeviceRegistry for Box<T> {
    fn register(&mut self, spec: &DeviceSpec) -> Result<DeviceHandle, BoxError> {
        (**self).register(spec)
    }

    fn unregister(&mut self, handle: DeviceHandle) -> Result<(), BoxError> {
        (**self).unregister(handle)
    }
}
