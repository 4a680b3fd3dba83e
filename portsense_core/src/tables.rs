//! Classification tables.
//!
//! Every table is an ordered list of disjoint inclusive bands. A sample that
//! falls into no band classifies as `DeviceType::Error`.
use std::fmt;

use crate::types::DeviceType;

/// Inclusive millivolt (or identifier) range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band<T> {
    pub min: i32,
    pub max: i32,
    pub value: T,
}

impl<T> Band<T> {
    pub const fn new(min: i32, max: i32, value: T) -> Self {
        Self { min, max, value }
    }

    #[inline]
    pub fn contains(&self, v: i32) -> bool {
        v >= self.min && v <= self.max
    }
}

/// Plain voltage window with no payload.
pub type Window = Band<()>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    Inverted { index: usize },
    Overlap { index: usize },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Inverted { index } => write!(f, "band {index} has min > max"),
            TableError::Overlap { index } => {
                write!(f, "band {index} overlaps or precedes the previous band")
            }
        }
    }
}

impl std::error::Error for TableError {}

#[derive(Debug, Clone, Copy)]
pub struct BandTable<T: 'static> {
    name: &'static str,
    bands: &'static [Band<T>],
}

impl<T: Copy> BandTable<T> {
    pub const fn new(name: &'static str, bands: &'static [Band<T>]) -> Self {
        Self { name, bands }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bands(&self) -> &'static [Band<T>] {
        self.bands
    }

    pub fn lookup(&self, v: i32) -> Option<T> {
        self.bands.iter().find(|b| b.contains(v)).map(|b| b.value)
    }

    /// Bands must be non-inverted, ascending and disjoint.
    pub fn validate(&self) -> Result<(), TableError> {
        for (i, b) in self.bands.iter().enumerate() {
            if b.min > b.max {
                return Err(TableError::Inverted { index: i });
            }
            if i > 0 && b.min <= self.bands[i - 1].max {
                return Err(TableError::Overlap { index: i });
            }
        }
        Ok(())
    }
}

// ── EV3 input port ──────────────────────────────────────────────────────────

pub const PIN1_NEAR_5V: i32 = 4900;
pub const PIN1_NEAR_PIN2: i32 = 3100;
pub const PIN1_NEAR_GND: i32 = 100;
pub const PIN1_TOUCH: Window = Window::new(851, 949, ());
/// Drift between the two NXT touch reads must stay below this.
pub const PIN1_TOUCH_VAR: i32 = 10;

const ID_VAR: i32 = 50;

const fn id_band(center: i32, t: DeviceType) -> Band<DeviceType> {
    Band::new(center - ID_VAR, center + ID_VAR, t)
}

/// EV3-family pin1 table: UART sensors pull pin1 to ground, analog sensors
/// carry an identification resistor.
pub const EV3_PIN1: BandTable<DeviceType> = BandTable::new(
    "ev3-input pin1",
    &[
        Band::new(i32::MIN, PIN1_NEAR_GND - 1, DeviceType::Ev3Uart),
        id_band(206, DeviceType::Ev3Analog(1)),
        id_band(417, DeviceType::Ev3Touch),
        id_band(575, DeviceType::Ev3Analog(3)),
        id_band(833, DeviceType::Ev3Analog(4)),
        id_band(1063, DeviceType::Ev3Analog(5)),
        id_band(1241, DeviceType::Ev3Analog(6)),
        id_band(1403, DeviceType::Ev3Analog(7)),
        id_band(1599, DeviceType::Ev3Analog(8)),
        id_band(1795, DeviceType::Ev3Analog(9)),
        id_band(2024, DeviceType::Ev3Analog(10)),
        id_band(2204, DeviceType::Ev3Analog(11)),
        id_band(2382, DeviceType::Ev3Analog(12)),
        id_band(2619, DeviceType::Ev3Analog(13)),
        id_band(2826, DeviceType::Ev3Analog(14)),
    ],
);

// ── EV3 output port ─────────────────────────────────────────────────────────

pub const ADC_REF: i32 = 5000;
/// Float and low references closer than this are "the same".
pub const REF_TOLERANCE: i32 = 50;
pub const PIN5_BALANCE: Window = Window::new(2400, 2600, ());

/// Verdict for an output port whose float and low references agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputClass {
    Device(DeviceType),
    /// Balance band: a sensor if pin6 is high, otherwise needs the pin5 probe.
    Balance,
    /// Needs the pin5-high probe.
    Probe,
}

/// Pin5 float voltage with equal references. Covers the whole i32 range.
pub const OUTPUT_FLOAT: BandTable<OutputClass> = BandTable::new(
    "ev3-output pin5 float",
    &[
        // dumb sensor
        Band::new(i32::MIN, 99, OutputClass::Device(DeviceType::Error)),
        Band::new(100, 250, OutputClass::Device(DeviceType::Tacho)),
        Band::new(251, 450, OutputClass::Device(DeviceType::MiniTacho)),
        Band::new(451, 649, OutputClass::Device(DeviceType::NewTacho)),
        // NXT light sensor
        Band::new(650, 850, OutputClass::Device(DeviceType::Error)),
        Band::new(851, 2399, OutputClass::Device(DeviceType::NewTacho)),
        Band::new(2400, 2600, OutputClass::Balance),
        Band::new(2601, 2799, OutputClass::Probe),
        // NXT I2C sensor
        Band::new(2800, 3700, OutputClass::Device(DeviceType::Error)),
        Band::new(3701, i32::MAX, OutputClass::Probe),
    ],
);

/// Pin5 voltage while pin5 is driven high.
pub const OUTPUT_PIN5_HIGH: BandTable<DeviceType> = BandTable::new(
    "ev3-output pin5 high",
    &[
        Band::new(i32::MIN, 1599, DeviceType::Error),
        Band::new(1600, 1999, DeviceType::MiniTacho),
        Band::new(2000, i32::MAX, DeviceType::Tacho),
    ],
);

// ── WeDo port ───────────────────────────────────────────────────────────────

/// Identifier byte ranges; `None` is the open (empty) port, the two short
/// bands are wiring faults.
pub const WEDO_ID: BandTable<DeviceType> = BandTable::new(
    "wedo id",
    &[
        Band::new(0, 9, DeviceType::Error),
        Band::new(10, 27, DeviceType::WedoBend),
        Band::new(28, 47, DeviceType::WedoTilt),
        Band::new(48, 67, DeviceType::WedoFuture),
        Band::new(68, 87, DeviceType::WedoRaw),
        Band::new(88, 109, DeviceType::WedoTouch),
        Band::new(110, 131, DeviceType::WedoSound),
        Band::new(132, 152, DeviceType::WedoTemp),
        Band::new(153, 169, DeviceType::WedoLight),
        Band::new(170, 190, DeviceType::WedoMotion),
        Band::new(191, 211, DeviceType::WedoLightbrick),
        Band::new(212, 224, DeviceType::Wedo22),
        Band::new(225, 233, DeviceType::None),
        Band::new(234, 246, DeviceType::WedoMotor),
        Band::new(247, 255, DeviceType::Error),
    ],
);

/// Names and validation results for every built-in table.
pub fn validate_all() -> Vec<(&'static str, Result<(), TableError>)> {
    vec![
        (EV3_PIN1.name(), EV3_PIN1.validate()),
        (OUTPUT_FLOAT.name(), OUTPUT_FLOAT.validate()),
        (OUTPUT_PIN5_HIGH.name(), OUTPUT_PIN5_HIGH.validate()),
        (WEDO_ID.name(), WEDO_ID.validate()),
    ]
}

/// Classify an EV3-family pin1 reading.
pub fn classify_ev3_pin1(mv: i32) -> DeviceType {
    if mv > PIN1_NEAR_PIN2 {
        return DeviceType::Error;
    }
    EV3_PIN1.lookup(mv).unwrap_or(DeviceType::Error)
}

pub fn classify_wedo_id(id: i32) -> DeviceType {
    WEDO_ID.lookup(id).unwrap_or(DeviceType::Error)
}
