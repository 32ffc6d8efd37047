//! Controller device discovery.
//!
//! USB serial adapters enumerate under unstable names, so the locator first
//! scans the port list for a known USB vendor ID and only then falls back to
//! a configured list of fixed device paths.

use spraygate_types::GatewayError;
use std::path::Path;
use tracing::{debug, info};

/// Resolves the serial device path for the spray controller.
#[derive(Debug, Clone)]
pub struct DeviceLocator {
    vendor_ids: Vec<u16>,
    fallback_paths: Vec<String>,
}

impl DeviceLocator {
    pub fn new(vendor_ids: Vec<u16>, fallback_paths: Vec<String>) -> Self {
        Self {
            vendor_ids,
            fallback_paths,
        }
    }

    /// Find a connectable device path.
    ///
    /// Preference order: first enumerated USB port whose vendor ID matches,
    /// then the first fallback path that exists on disk.
    pub fn resolve(&self) -> Result<String, GatewayError> {
        if let Ok(ports) = serialport::available_ports() {
            for port in &ports {
                if let serialport::SerialPortType::UsbPort(usb) = &port.port_type
                    && self.vendor_ids.contains(&usb.vid)
                {
                    info!(
                        path = port.port_name,
                        vid = format_args!("{:04x}", usb.vid),
                        "matched controller by USB vendor id"
                    );
                    return Ok(port.port_name.clone());
                }
            }
            debug!(count = ports.len(), "no enumerated port matched a known vendor id");
        }

        for path in &self.fallback_paths {
            if Path::new(path).exists() {
                info!(path, "using fallback device path");
                return Ok(path.clone());
            }
        }

        Err(GatewayError::Link(
            "no controller device found: no USB vendor match and no fallback path exists"
                .to_string(),
        ))
    }
}

impl Default for DeviceLocator {
    fn default() -> Self {
        // CH340 and FTDI bridges, the adapters shipped with the controller.
        Self::new(
            vec![0x1a86, 0x0403],
            vec![
                "/dev/ttyUSB0".to_string(),
                "/dev/ttyACM0".to_string(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_fails_with_no_candidates() {
        let locator = DeviceLocator::new(vec![], vec![]);
        assert!(matches!(locator.resolve(), Err(GatewayError::Link(_))));
    }

    #[test]
    fn fallback_path_must_exist() {
        let locator = DeviceLocator::new(vec![], vec!["/definitely/not/a/device".to_string()]);
        assert!(locator.resolve().is_err());
    }

    #[test]
    fn existing_fallback_path_is_used() {
        // /dev/null always exists, standing in for a fixed device node.
        let locator = DeviceLocator::new(vec![], vec!["/dev/null".to_string()]);
        assert_eq!(locator.resolve().unwrap(), "/dev/null");
    }
}
