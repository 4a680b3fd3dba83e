//! Test and helper mocks for portsense_core
use crossbeam_channel as xch;
use portsense_traits::{
    BoxError, Channel, DeviceHandle, DeviceRegistry, DeviceSpec, Direction, Pin, PinDriver,
    SignalSource,
};

/// Signal source and pin driver where every call fails.
pub struct FailingIo;

fn unavailable() -> BoxError {
    Box::new(std::io::Error::other("signal source unavailable"))
}

impl SignalSource for FailingIo {
    fn read_voltage(&mut self, _port: u8, _channel: Channel) -> Result<i32, BoxError> {
        Err(unavailable())
    }

    fn read_digital(&mut self, _port: u8, _pin: Pin) -> Result<bool, BoxError> {
        Err(unavailable())
    }
}

impl PinDriver for FailingIo {
    fn set_direction(&mut self, _port: u8, _pin: Pin, _dir: Direction) -> Result<(), BoxError> {
        Err(unavailable())
    }

    fn set_level(&mut self, _port: u8, _pin: Pin, _high: bool) -> Result<(), BoxError> {
        Err(unavailable())
    }
}

/// Registry that holds every registration until the paired `Gate` opens.
pub struct GatedRegistry<R> {
    inner: R,
    gate: xch::Receiver<()>,
}

/// Releases one held registration per `release`. Dropping it opens the gate
/// for good.
pub struct Gate(xch::Sender<()>);

impl Gate {
    pub fn release(&self) {
        let _ = self.0.send(());
    }
}

pub fn gated<R: DeviceRegistry>(inner: R) -> (GatedRegistry<R>, Gate) {
    let (tx, rx) = xch::unbounded();
    (GatedRegistry { inner, gate: rx }, Gate(tx))
}

impl<R: DeviceRegistry> DeviceRegistry for GatedRegistry<R> {
    fn register(&mut self, spec: &DeviceSpec) -> Result<DeviceHandle, BoxError> {
        // Err means the gate was dropped.
        let _ = self.gate.recv();
        self.inner.register(spec)
    }

    fn unregister(&mut self, handle: DeviceHandle) -> Result<(), BoxError> {
        self.inner.unregister(handle)
    }
}
