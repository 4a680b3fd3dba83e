#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validate must reject bad input with an error, never a panic.
    if let Ok(cfg) = portsense_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A validated config must convert without surprises.
            let settings = portsense_core::Settings::from(&cfg);
            assert!(settings.timing.validate().is_ok());
            for p in &cfg.ports {
                let _ = portsense_core::PortSpec::from(p);
            }
        }
    }
});
