use eros_transport::list_serial_ports;

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let mut devices =
        list_serial_ports().map_err(|err| transport_error("port enumeration failed", err))?;
    if args.known_only {
        devices.retain(|device| device.vendor_label() != "Unknown");
    }
    tracing::debug!(count = devices.len(), "listing serial ports");
    print_ports(&devices, format);
    Ok(SUCCESS)
}
