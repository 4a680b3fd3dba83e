//! Backend assembly: simulated board by default, rppal/IIO with `hardware`.

use portsense_config::Config;
use portsense_core::{PortKind, PortSpec};
use portsense_hardware::{SimBoard, Wire};

/// Empty-port electrical picture for a kind.
pub fn baseline(kind: PortKind) -> Wire {
    match kind {
        PortKind::Ev3Input => Wire::EV3_INPUT_EMPTY,
        PortKind::Ev3Output => Wire::EV3_OUTPUT_EMPTY,
        PortKind::WeDo => Wire::WEDO_EMPTY,
        // Multiplexer channels sit behind an input port.
        PortKind::HtSmux | PortKind::MsEv3Smux => Wire::EV3_INPUT_EMPTY,
    }
}

pub fn port_specs(cfg: &Config) -> Vec<PortSpec> {
    cfg.ports.iter().map(PortSpec::from).collect()
}

/// Simulated board with every configured port wired and empty.
pub fn sim_board(cfg: &Config) -> SimBoard {
    let board = SimBoard::new();
    for p in &cfg.ports {
        board.add_port(p.index, baseline(p.kind.into()));
    }
    tracing::info!(ports = cfg.ports.len(), "using simulated board");
    board
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn gpio_board(cfg: &Config) -> eyre::Result<portsense_hardware::gpio::GpioBoard> {
    use portsense_hardware::gpio::{GpioBoard, PortWiring};
    use portsense_traits::{Channel, Pin};

    let mut wiring = Vec::with_capacity(cfg.ports.len());
    for p in &cfg.ports {
        let Some(w) = p.wiring.as_ref() else {
            eyre::bail!("ports.wiring missing for '{}' (required with the hardware backend)", p.name);
        };
        let gpio = [
            (Pin::P1, w.pin1),
            (Pin::P2, w.pin2),
            (Pin::P5, w.pin5),
            (Pin::P6, w.pin6),
        ]
        .into_iter()
        .filter_map(|(pin, bcm)| bcm.map(|b| (pin, b)))
        .collect();
        let adc = [
            (Channel::Pin1, w.adc_pin1),
            (Channel::Pin5, w.adc_pin5),
            (Channel::Pin6, w.adc_pin6),
            (Channel::Id, w.adc_id),
        ]
        .into_iter()
        .filter_map(|(ch, n)| n.map(|n| (ch, n)))
        .collect();
        wiring.push(PortWiring {
            index: p.index,
            gpio,
            adc,
        });
    }
    let board = GpioBoard::new(&wiring, std::path::Path::new(&cfg.hardware.iio_dir))?;
    Ok(board)
}
