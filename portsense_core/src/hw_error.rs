//! Maps `Box<dyn Error>` from trait boundaries to typed `PortError`.
//!
//! The traits in `portsense_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `portsense_hardware::HwError` downcasting.

use crate::error::PortError;

/// Map a collaborator failure on `port` to a typed `PortError`.
pub fn map_hw_error(port: &str, e: &(dyn std::error::Error + 'static)) -> PortError {
    #[cfg(feature = "hardware-errors")]
    {
        use portsense_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Rejected { driver, reason } => PortError::AttachFailed {
                    port: port.to_string(),
                    reason: format!("{driver}: {reason}"),
                },
                other => PortError::ResourceUnavailable {
                    port: port.to_string(),
                    reason: other.to_string(),
                },
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("reject") || lower.contains("refused") {
        PortError::AttachFailed {
            port: port.to_string(),
            reason: s,
        }
    } else {
        PortError::ResourceUnavailable {
            port: port.to_string(),
            reason: s,
        }
    }
}
