use bitflags::bitflags;

bitflags! {
    /// Digital/threshold conditions latched from one passive sample.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PinFlags: u8 {
        /// Input port: pin2 pulled low (NXT family marker).
        const PIN2_LOW = 1 << 0;
        /// Input port: pin1 below the 5 V rail.
        const PIN1_LOADED = 1 << 1;
        /// Input port: pin5 pulled low.
        const PIN5_LOW = 1 << 2;
        /// Pin6 held high.
        const PIN6_HIGH = 1 << 3;
        /// Output port: pin5 outside the balance band.
        const PIN5_LOADED = 1 << 4;
    }
}
