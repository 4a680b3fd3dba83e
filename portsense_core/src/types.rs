//! Port, device and mode vocabulary shared by every module.
use std::fmt;

use crate::error::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Ev3Input,
    Ev3Output,
    WeDo,
    /// HiTechnic sensor multiplexer channel.
    HtSmux,
    /// Mindsensors EV3 sensor multiplexer channel.
    MsEv3Smux,
}

impl PortKind {
    pub const ALL: [PortKind; 5] = [
        PortKind::Ev3Input,
        PortKind::Ev3Output,
        PortKind::WeDo,
        PortKind::HtSmux,
        PortKind::MsEv3Smux,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PortKind::Ev3Input => "ev3-input",
            PortKind::Ev3Output => "ev3-output",
            PortKind::WeDo => "wedo",
            PortKind::HtSmux => "ht-smux",
            PortKind::MsEv3Smux => "ms-ev3-smux",
        }
    }

    /// Mode table for this kind, in display order.
    pub fn modes(self) -> &'static [(&'static str, Mode)] {
        match self {
            PortKind::Ev3Input => EV3_INPUT_MODES,
            PortKind::Ev3Output => EV3_OUTPUT_MODES,
            PortKind::WeDo => WEDO_MODES,
            PortKind::HtSmux => HT_SMUX_MODES,
            PortKind::MsEv3Smux => MS_EV3_SMUX_MODES,
        }
    }

    /// Mode a port of this kind starts in. Multiplexer channels cannot
    /// identify what is plugged in, so they start in their first host mode.
    pub fn initial_mode(self) -> Mode {
        self.modes().first().map_or(Mode::Auto, |(_, m)| *m)
    }

    /// Whether the connection state machine runs for this kind at all.
    pub fn detects(self) -> bool {
        self.modes().iter().any(|(_, m)| *m == Mode::Auto)
    }

    /// Space separated mode names.
    pub fn mode_names(self) -> String {
        self.modes()
            .iter()
            .map(|(n, _)| *n)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable identity of a port: hardware slot plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortId {
    pub index: u8,
    pub name: String,
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Recognized device classes plus the `None` and `Error` sentinels.
///
/// `Ev3Analog` carries the resistor id (1..=14, 2 being the touch sensor
/// which has its own variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    #[default]
    None,
    Error,
    NxtTouch,
    NxtLight,
    NxtAnalog,
    NxtColor,
    NxtI2c,
    Ev3Touch,
    Ev3Analog(u8),
    Ev3Uart,
    Tacho,
    MiniTacho,
    NewTacho,
    RcxMotor,
    RcxLed,
    WedoBend,
    WedoTilt,
    WedoFuture,
    WedoRaw,
    WedoTouch,
    WedoSound,
    WedoTemp,
    WedoLight,
    WedoMotion,
    WedoLightbrick,
    Wedo22,
    WedoMotor,
    HtSmuxI2c,
    MsSmuxUart,
    MsSmuxAnalog,
}

/// Which family of hardware a device class belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Sentinel,
    Nxt,
    Ev3Sensor,
    Motor,
    Rcx,
    WeDo,
    Mux,
}

impl DeviceType {
    pub const ALL: [DeviceType; 42] = [
        DeviceType::None,
        DeviceType::Error,
        DeviceType::NxtTouch,
        DeviceType::NxtLight,
        DeviceType::NxtAnalog,
        DeviceType::NxtColor,
        DeviceType::NxtI2c,
        DeviceType::Ev3Touch,
        DeviceType::Ev3Analog(1),
        DeviceType::Ev3Analog(3),
        DeviceType::Ev3Analog(4),
        DeviceType::Ev3Analog(5),
        DeviceType::Ev3Analog(6),
        DeviceType::Ev3Analog(7),
        DeviceType::Ev3Analog(8),
        DeviceType::Ev3Analog(9),
        DeviceType::Ev3Analog(10),
        DeviceType::Ev3Analog(11),
        DeviceType::Ev3Analog(12),
        DeviceType::Ev3Analog(13),
        DeviceType::Ev3Analog(14),
        DeviceType::Ev3Uart,
        DeviceType::Tacho,
        DeviceType::MiniTacho,
        DeviceType::NewTacho,
        DeviceType::RcxMotor,
        DeviceType::RcxLed,
        DeviceType::WedoBend,
        DeviceType::WedoTilt,
        DeviceType::WedoFuture,
        DeviceType::WedoRaw,
        DeviceType::WedoTouch,
        DeviceType::WedoSound,
        DeviceType::WedoTemp,
        DeviceType::WedoLight,
        DeviceType::WedoMotion,
        DeviceType::WedoLightbrick,
        DeviceType::Wedo22,
        DeviceType::WedoMotor,
        DeviceType::HtSmuxI2c,
        DeviceType::MsSmuxUart,
        DeviceType::MsSmuxAnalog,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DeviceType::None => "no-device",
            DeviceType::Error => "error",
            DeviceType::NxtTouch => "nxt-touch",
            DeviceType::NxtLight => "nxt-light",
            DeviceType::NxtAnalog => "nxt-analog",
            DeviceType::NxtColor => "nxt-color",
            DeviceType::NxtI2c => "nxt-i2c",
            DeviceType::Ev3Touch => "ev3-touch",
            DeviceType::Ev3Analog(_) => "ev3-analog",
            DeviceType::Ev3Uart => "ev3-uart",
            DeviceType::Tacho => "tacho",
            DeviceType::MiniTacho => "mini-tacho",
            DeviceType::NewTacho => "new-tacho",
            DeviceType::RcxMotor => "rcx-motor",
            DeviceType::RcxLed => "rcx-led",
            DeviceType::WedoBend => "bend",
            DeviceType::WedoTilt => "tilt",
            DeviceType::WedoFuture => "future",
            DeviceType::WedoRaw => "raw",
            DeviceType::WedoTouch => "touch",
            DeviceType::WedoSound => "sound",
            DeviceType::WedoTemp => "temp",
            DeviceType::WedoLight => "light",
            DeviceType::WedoMotion => "motion",
            DeviceType::WedoLightbrick => "lightbrick",
            DeviceType::Wedo22 => "22",
            DeviceType::WedoMotor => "motor",
            DeviceType::HtSmuxI2c => "ht-smux-i2c",
            DeviceType::MsSmuxUart => "ms-ev3-smux-uart",
            DeviceType::MsSmuxAnalog => "ms-ev3-smux-analog",
        }
    }

    /// Host driver that binds this class, if any.
    pub fn driver(self) -> Option<&'static str> {
        match self {
            DeviceType::NxtTouch | DeviceType::NxtLight | DeviceType::NxtAnalog => {
                Some("nxt-analog-host")
            }
            DeviceType::NxtColor => Some("nxt-color-host"),
            DeviceType::NxtI2c => Some("nxt-i2c-host"),
            DeviceType::Ev3Touch | DeviceType::Ev3Analog(_) => Some("ev3-analog-host"),
            DeviceType::Ev3Uart => Some("ev3-uart-host"),
            DeviceType::Tacho | DeviceType::MiniTacho | DeviceType::NewTacho => {
                Some("ev3-tacho-motor")
            }
            DeviceType::RcxMotor => Some("rcx-motor"),
            DeviceType::RcxLed => Some("rcx-led"),
            DeviceType::WedoTilt | DeviceType::WedoMotion => Some("wedo-sensor"),
            DeviceType::WedoMotor => Some("wedo-motor"),
            DeviceType::WedoLightbrick => Some("wedo-lightbrick"),
            DeviceType::HtSmuxI2c => Some("ht-smux-i2c-host"),
            DeviceType::MsSmuxUart => Some("ms-ev3-smux-uart-host"),
            DeviceType::MsSmuxAnalog => Some("ms-ev3-smux-analog-host"),
            DeviceType::None
            | DeviceType::Error
            | DeviceType::WedoBend
            | DeviceType::WedoFuture
            | DeviceType::WedoRaw
            | DeviceType::WedoTouch
            | DeviceType::WedoSound
            | DeviceType::WedoTemp
            | DeviceType::WedoLight
            | DeviceType::Wedo22 => None,
        }
    }

    /// Initial variant handed to drivers hosting several device classes.
    pub fn variant(self) -> Option<&'static str> {
        match self {
            DeviceType::NxtTouch
            | DeviceType::NxtLight
            | DeviceType::NxtAnalog
            | DeviceType::NxtColor
            | DeviceType::Ev3Touch
            | DeviceType::Ev3Analog(_)
            | DeviceType::WedoTilt
            | DeviceType::WedoMotion => Some(self.name()),
            DeviceType::Tacho | DeviceType::MiniTacho | DeviceType::NewTacho => Some("ev3-motor"),
            // The multiplexer reports its channel mode; these are the
            // power-on sensors for each host.
            DeviceType::MsSmuxUart => Some("lego-ev3-uart-29"),
            DeviceType::MsSmuxAnalog => Some("lego-ev3-touch"),
            DeviceType::None
            | DeviceType::Error
            | DeviceType::NxtI2c
            | DeviceType::Ev3Uart
            | DeviceType::RcxMotor
            | DeviceType::RcxLed
            | DeviceType::WedoBend
            | DeviceType::WedoFuture
            | DeviceType::WedoRaw
            | DeviceType::WedoTouch
            | DeviceType::WedoSound
            | DeviceType::WedoTemp
            | DeviceType::WedoLight
            | DeviceType::WedoLightbrick
            | DeviceType::Wedo22
            | DeviceType::WedoMotor
            | DeviceType::HtSmuxI2c => None,
        }
    }

    pub fn family(self) -> Family {
        match self {
            DeviceType::None | DeviceType::Error => Family::Sentinel,
            DeviceType::NxtTouch
            | DeviceType::NxtLight
            | DeviceType::NxtAnalog
            | DeviceType::NxtColor
            | DeviceType::NxtI2c => Family::Nxt,
            DeviceType::Ev3Touch | DeviceType::Ev3Analog(_) | DeviceType::Ev3Uart => {
                Family::Ev3Sensor
            }
            DeviceType::Tacho | DeviceType::MiniTacho | DeviceType::NewTacho => Family::Motor,
            DeviceType::RcxMotor | DeviceType::RcxLed => Family::Rcx,
            DeviceType::WedoBend
            | DeviceType::WedoTilt
            | DeviceType::WedoFuture
            | DeviceType::WedoRaw
            | DeviceType::WedoTouch
            | DeviceType::WedoSound
            | DeviceType::WedoTemp
            | DeviceType::WedoLight
            | DeviceType::WedoMotion
            | DeviceType::WedoLightbrick
            | DeviceType::Wedo22
            | DeviceType::WedoMotor => Family::WeDo,
            DeviceType::HtSmuxI2c | DeviceType::MsSmuxUart | DeviceType::MsSmuxAnalog => {
                Family::Mux
            }
        }
    }

    /// Not a sentinel.
    pub fn is_concrete(self) -> bool {
        self.family() != Family::Sentinel
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Ev3Analog(id) => write!(f, "ev3-analog-{id:02}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Operating mode of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// State machine drives identification.
    #[default]
    Auto,
    /// Fixed device class, attached without classification.
    Forced(DeviceType),
    /// Pins floated and left for external inspection.
    Raw,
    /// Pins handed to an external UART user; nothing attached.
    OtherUart,
}

const EV3_INPUT_MODES: &[(&str, Mode)] = &[
    ("auto", Mode::Auto),
    ("nxt-analog", Mode::Forced(DeviceType::NxtAnalog)),
    ("nxt-color", Mode::Forced(DeviceType::NxtColor)),
    ("nxt-i2c", Mode::Forced(DeviceType::NxtI2c)),
    ("ev3-analog", Mode::Forced(DeviceType::Ev3Analog(1))),
    ("ev3-uart", Mode::Forced(DeviceType::Ev3Uart)),
    ("other-uart", Mode::OtherUart),
    ("raw", Mode::Raw),
];

const EV3_OUTPUT_MODES: &[(&str, Mode)] = &[
    ("auto", Mode::Auto),
    ("ev3-tacho-motor", Mode::Forced(DeviceType::Tacho)),
    ("rcx-motor", Mode::Forced(DeviceType::RcxMotor)),
    ("rcx-led", Mode::Forced(DeviceType::RcxLed)),
    ("raw", Mode::Raw),
];

const WEDO_MODES: &[(&str, Mode)] = &[
    ("auto", Mode::Auto),
    ("tilt", Mode::Forced(DeviceType::WedoTilt)),
    ("motion", Mode::Forced(DeviceType::WedoMotion)),
    ("motor", Mode::Forced(DeviceType::WedoMotor)),
    ("lightbrick", Mode::Forced(DeviceType::WedoLightbrick)),
    ("raw", Mode::Raw),
];

const HT_SMUX_MODES: &[(&str, Mode)] = &[
    ("analog", Mode::Forced(DeviceType::NxtAnalog)),
    ("i2c", Mode::Forced(DeviceType::HtSmuxI2c)),
];

const MS_EV3_SMUX_MODES: &[(&str, Mode)] = &[
    ("uart", Mode::Forced(DeviceType::MsSmuxUart)),
    ("analog", Mode::Forced(DeviceType::MsSmuxAnalog)),
];

impl Mode {
    /// Resolve a mode name against the table for `kind`.
    pub fn parse(kind: PortKind, name: &str, port: &str) -> Result<Mode, PortError> {
        let wanted = name.trim();
        kind.modes()
            .iter()
            .find(|(n, _)| *n == wanted)
            .map(|(_, m)| *m)
            .ok_or_else(|| PortError::InvalidModeTransition {
                port: port.to_string(),
                mode: wanted.to_string(),
            })
    }

    /// Table name of this mode for `kind`; `None` if the kind has no such mode.
    pub fn name(self, kind: PortKind) -> Option<&'static str> {
        kind.modes().iter().find(|(_, m)| *m == self).map(|(n, _)| *n)
    }

    pub fn is_passthrough(self) -> bool {
        matches!(self, Mode::Raw | Mode::OtherUart)
    }
}

/// Active probe while a port is between passive observation and a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Passive second read of pin1 for the NXT touch/analog ambiguity.
    NxtTouchRecheck,
    /// Pin6 pulled low to capture the low reference.
    Pin6Low,
    /// Pin5 driven high to split motor variants.
    Pin5High,
}

impl Probe {
    pub fn name(self) -> &'static str {
        match self {
            Probe::NxtTouchRecheck => "nxt-touch-recheck",
            Probe::Pin6Low => "pin6-low",
            Probe::Pin5High => "pin5-high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Init,
    InitSettle,
    NoDevice,
    Probing(Probe),
    Connected,
    WaitingForDisconnect,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Init => f.write_str("init"),
            ConnectionState::InitSettle => f.write_str("init-settle"),
            ConnectionState::NoDevice => f.write_str("no-device"),
            ConnectionState::Probing(p) => write!(f, "probing:{}", p.name()),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::WaitingForDisconnect => f.write_str("waiting-for-disconnect"),
        }
    }
}
