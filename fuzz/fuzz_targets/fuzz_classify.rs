#![no_main]
use libfuzzer_sys::fuzz_target;
use portsense_core::{DeviceType, tables};

fuzz_target!(|input: (i32, u8)| {
    let (mv, id) = input;
    // Every reading lands somewhere; pin1 never reads as "nothing plugged".
    assert_ne!(tables::classify_ev3_pin1(mv), DeviceType::None);
    let t = tables::classify_wedo_id(i32::from(id));
    let _ = t.driver();
});
