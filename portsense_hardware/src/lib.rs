//! Port backends: a simulated board and registry for development and tests,
//! and (feature `hardware`) an rppal/IIO backend for real connectors.
pub mod error;
pub mod registry;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use error::HwError;
pub use registry::{RecordingRegistry, RegistryEvent};
pub use sim::{SimBoard, Wire};
