//! Human-readable error descriptions and structured JSON error formatting.

use portsense_core::error::{BuildError, PortError};
use portsense_hardware::HwError;
use serde_json::json;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingIo => {
                "What happened: No signal source was provided to the port manager.\nLikely causes: The board backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the board is created successfully and passed via with_io(...).".to_string()
            }
            BuildError::MissingRegistry => {
                "What happened: No device registry was provided to the port manager.\nLikely causes: The registry was not wired into the builder.\nHow to fix: Pass a registry via with_registry(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in [timing] or [dispatcher].\nHow to fix: Edit the config file, then rerun. Defaults: poll_ms=10, settle_ticks=2, add_ticks=10, remove_ticks=35."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PortError>() {
        return match pe {
            PortError::InvalidModeTransition { port, mode } => format!(
                "What happened: '{mode}' is not a mode port {port} accepts.\nLikely causes: A typo, or a mode that belongs to a different port kind.\nHow to fix: Run `portsense modes` to list the accepted names."
            ),
            PortError::UnknownPort(port) => format!(
                "What happened: No port named '{port}' is configured.\nLikely causes: The name differs from the [[ports]] entries in the config.\nHow to fix: Use one of the configured port names."
            ),
            PortError::ResourceUnavailable { port, reason } => format!(
                "What happened: Port {port} could not be brought up ({reason}).\nLikely causes: Wrong index or wiring, or the process lacks GPIO/IIO access.\nHow to fix: Check the port's index and [ports.wiring] in the config and the device permissions."
            ),
            PortError::DuplicatePort(port) => format!(
                "What happened: Port name '{port}' is configured more than once.\nLikely causes: A copied [[ports]] entry.\nHow to fix: Give every port a unique name."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(hw) = err.downcast_ref::<HwError>() {
        return format!(
            "What happened: Hardware backend error ({hw}).\nLikely causes: GPIO lines or the IIO device are missing or not accessible.\nHow to fix: Check [hardware].iio_dir and the [ports.wiring] lines; run as a user with gpio/iio access."
        );
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML for portsense.\nLikely causes: A syntax error or an unknown value.\nHow to fix: Fix the file and rerun. Parser said: {}",
            te.message()
        );
    }

    // String-based heuristics for errors coming from config or trace loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("trace csv must have headers") {
        return "Invalid headers in trace CSV. Expected 'tick,port,pin1_mv,pin5_mv,pin6_mv,pin2,pin5,pin6,id'.".to_string();
    }

    if lower.contains("invalid csv row") || lower.contains("trace csv") {
        return format!(
            "What happened: The signal trace could not be loaded ({msg}).\nLikely causes: A malformed row or ticks out of order.\nHow to fix: Fix the CSV; rows must be sorted by tick and digital columns must be 0 or 1."
        );
    }

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config with a readable TOML file."
        );
    }

    if is_config_message(&lower) {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// `Config::validate` messages lead with the offending key.
fn is_config_message(lower: &str) -> bool {
    ["timing.", "dispatcher.", "ports", "logging."]
        .iter()
        .any(|p| lower.starts_with(p))
}

/// Short stable name for the error class, used in JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    if let Some(pe) = err.downcast_ref::<PortError>() {
        return match pe {
            PortError::ClassificationAmbiguous { .. } => "ClassificationAmbiguous",
            PortError::AttachFailed { .. } => "AttachFailed",
            PortError::ResourceUnavailable { .. } => "ResourceUnavailable",
            PortError::InvalidModeTransition { .. } => "InvalidModeTransition",
            PortError::UnknownPort(_) => "UnknownPort",
            PortError::DuplicatePort(_) => "DuplicatePort",
            PortError::DispatcherStopped => "DispatcherStopped",
        };
    }
    if err.downcast_ref::<HwError>().is_some() {
        return "Hardware";
    }
    if err.downcast_ref::<toml::de::Error>().is_some()
        || is_config_message(&err.to_string().to_ascii_lowercase())
    {
        return "InvalidConfig";
    }
    "Error"
}

/// Map typed errors to stable exit codes; anything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "InvalidConfig" | "DuplicatePort" => 3,
        "ResourceUnavailable" | "Hardware" => 4,
        "InvalidModeTransition" | "UnknownPort" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    let reason = reason_name(err);
    let details = match err.downcast_ref::<PortError>() {
        Some(PortError::InvalidModeTransition { port, mode }) => {
            Some(json!({ "port": port, "mode": mode }))
        }
        Some(
            PortError::ResourceUnavailable { port, reason }
            | PortError::AttachFailed { port, reason },
        ) => Some(json!({ "port": port, "cause": reason })),
        Some(PortError::UnknownPort(port) | PortError::DuplicatePort(port)) => {
            Some(json!({ "port": port }))
        }
        _ => None,
    };
    let obj = if let Some(d) = details {
        json!({ "reason": reason, "details": d, "message": humanize(err) })
    } else {
        json!({ "reason": reason, "message": humanize(err) })
    };
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_mode_maps_to_its_own_exit_code() {
        let err = eyre::Report::new(PortError::InvalidModeTransition {
            port: "in1".into(),
            mode: "laser".into(),
        });
        assert_eq!(exit_code_for_error(&err), 5);
        assert!(humanize(&err).contains("portsense modes"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "InvalidModeTransition");
        assert_eq!(v["details"]["mode"], "laser");
    }

    #[test]
    fn build_errors_are_config_errors() {
        let err = eyre::Report::new(BuildError::InvalidConfig("settle_ticks must be < add_ticks"));
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).starts_with("What happened: Invalid configuration"));
    }

    #[test]
    fn untyped_errors_fall_back() {
        let err = eyre::eyre!("something odd");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("Original: something odd"));
    }
}
