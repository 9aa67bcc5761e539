use std::time::Duration;

use serialport::SerialPortType;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::ErosStream;
use crate::transport::Transport;

/// USB vendor ids of hardware commonly running eros firmware.
///
/// Used only to label devices in listings; the protocol does not depend on it.
const KNOWN_VENDORS: &[(u16, &str)] = &[(0x10C4, "ESP32"), (0x0403, "ESP-PROG")];

/// Label for a known USB vendor id.
pub fn known_vendor(vid: u16) -> Option<&'static str> {
    KNOWN_VENDORS
        .iter()
        .find(|(known, _)| *known == vid)
        .map(|(_, name)| *name)
}

/// USB metadata of a serial device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbInfo {
    pub vid: u16,
    pub pid: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

/// A serial device found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialDevice {
    /// OS device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    /// USB metadata, when the device sits behind a USB bridge.
    pub usb: Option<UsbInfo>,
}

impl SerialDevice {
    /// Vendor label, or `"Unknown"`.
    pub fn vendor_label(&self) -> &'static str {
        self.usb
            .as_ref()
            .and_then(|usb| known_vendor(usb.vid))
            .unwrap_or("Unknown")
    }

    /// `"<path> (<vendor label>)"`, as shown in device pickers.
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.path, self.vendor_label())
    }
}

/// List available serial devices.
pub fn list_serial_ports() -> Result<Vec<SerialDevice>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    let devices: Vec<SerialDevice> = ports
        .into_iter()
        .map(|port| {
            let usb = match port.port_type {
                SerialPortType::UsbPort(usb) => Some(UsbInfo {
                    vid: usb.vid,
                    pid: usb.pid,
                    manufacturer: usb.manufacturer,
                    product: usb.product,
                    serial_number: usb.serial_number,
                }),
                _ => None,
            };
            SerialDevice {
                path: port.port_name,
                usb,
            }
        })
        .collect();
    debug!(count = devices.len(), "enumerated serial ports");
    Ok(devices)
}

/// Serial port transport.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
}

impl SerialTransport {
    /// Baud rate used when none is given.
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;

    /// Timeout applied while opening; the facade sets its own read timeout.
    const OPEN_TIMEOUT: Duration = Duration::from_millis(100);

    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Result<ErosStream> {
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(Self::OPEN_TIMEOUT)
            .open()
            .map_err(|source| TransportError::Serial {
                path: self.path.clone(),
                source,
            })?;
        info!(path = %self.path, baud = self.baud_rate, "opened serial port");
        Ok(ErosStream::from_serial(port))
    }

    fn describe(&self) -> String {
        format!("serial://{}@{}", self.path, self.baud_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(vid: Option<u16>) -> SerialDevice {
        SerialDevice {
            path: "/dev/ttyUSB0".to_string(),
            usb: vid.map(|vid| UsbInfo {
                vid,
                pid: 0xEA60,
                manufacturer: None,
                product: None,
                serial_number: None,
            }),
        }
    }

    #[test]
    fn labels_known_vendors() {
        assert_eq!(known_vendor(4292), Some("ESP32"));
        assert_eq!(known_vendor(1027), Some("ESP-PROG"));
        assert_eq!(known_vendor(0x2341), None);
    }

    #[test]
    fn display_label_marks_unknown_devices() {
        assert_eq!(device(Some(0x10C4)).display_label(), "/dev/ttyUSB0 (ESP32)");
        assert_eq!(device(Some(0x1234)).display_label(), "/dev/ttyUSB0 (Unknown)");
        assert_eq!(device(None).display_label(), "/dev/ttyUSB0 (Unknown)");
    }

    #[test]
    #[cfg(unix)]
    fn opening_missing_device_fails() {
        let mut transport = SerialTransport::new("/dev/eros-does-not-exist", 115_200);
        let err = transport.connect().unwrap_err();
        assert!(matches!(err, TransportError::Serial { .. }));
    }

    #[test]
    fn describe_includes_baud() {
        let transport = SerialTransport::new("/dev/ttyACM0", 2_000_000);
        assert_eq!(transport.describe(), "serial:///dev/ttyACM0@2000000");
    }
}
