use memolink_transport::available_ports;
use tracing::debug;

use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(format: OutputFormat) -> CliResult<i32> {
    let ports = available_ports().map_err(|err| transport_error("port scan failed", err))?;
    debug!(count = ports.len(), "serial ports found");
    print_ports(&ports, format);
    Ok(SUCCESS)
}
