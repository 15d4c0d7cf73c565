use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort, SerialPortType};
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::{Result, TransportError};
use crate::traits::{CloseHandle, SerialLink};

/// Serial transport backed by the `serialport` crate.
///
/// Created closed; [`SerialLink::open`] acquires the device.
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
    close_handle: CloseHandle,
}

impl SerialTransport {
    /// Create a closed transport for the given configuration.
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: None,
            close_handle: CloseHandle::new(true),
        }
    }

    /// Current configuration (reflects baud-rate changes).
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "serial"
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        if self.close_handle.is_closed() {
            return Err(TransportError::Closed);
        }
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl SerialLink for SerialTransport {
    fn open(&mut self) -> Result<()> {
        if self.port.is_some() && !self.close_handle.is_closed() {
            warn!(port = %self.config.port, "serial port is already open");
            return Ok(());
        }
        if self.port.take().is_some() {
            // Closed through the handle: the device is still held and locked.
            debug!(port = %self.config.port, "releasing stale serial port");
        }

        let port = serialport::new(self.config.port.as_str(), self.config.baud_rate)
            .timeout(self.config.timeout)
            .open()
            .map_err(|source| TransportError::NoConnection {
                port: self.config.port.clone(),
                source,
            })?;

        self.port = Some(port);
        self.close_handle.reopen();
        info!(
            port = %self.config.port,
            baud_rate = self.config.baud_rate,
            timeout = ?self.config.timeout,
            "opened serial port"
        );
        Ok(())
    }

    fn close(&mut self, force: bool) -> bool {
        if self.port.is_none() && !force {
            warn!(port = %self.config.port, "serial port is already closed");
            return false;
        }

        self.close_handle.close();
        if self.port.take().is_some() {
            debug!(port = %self.config.port, "closed serial port");
        }
        true
    }

    fn is_open(&self) -> bool {
        self.port.is_some() && !self.close_handle.is_closed()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        let timeout = self.config.timeout;
        let port = self.port_mut()?;

        let mut buf = vec![0u8; n];
        let mut filled = 0usize;
        let deadline = Instant::now() + timeout;

        while filled < n {
            match port.read(&mut buf[filled..]) {
                Ok(read) => filled += read,
                Err(err) if err.kind() == ErrorKind::TimedOut => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    fn flush_input(&mut self) -> Result<()> {
        self.port_mut()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.port_mut()?.set_baud_rate(baud_rate)?;
        debug!(
            from = self.config.baud_rate,
            to = baud_rate,
            "changed serial baud rate"
        );
        self.config.baud_rate = baud_rate;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.config.baud_rate
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    fn close_handle(&self) -> CloseHandle {
        self.close_handle.clone()
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.config.port)
            .field("baud_rate", &self.config.baud_rate)
            .field("open", &self.is_open())
            .finish()
    }
}

/// A serial port discovered on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Name to pass as the port identifier.
    pub name: String,
    /// Short description of the port type.
    pub kind: String,
}

/// List serial ports available on this host.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            name: p.port_name,
            kind: match p.port_type {
                SerialPortType::UsbPort(usb) => format!("usb {:04x}:{:04x}", usb.vid, usb.pid),
                SerialPortType::PciPort => "pci".to_string(),
                SerialPortType::BluetoothPort => "bluetooth".to_string(),
                SerialPortType::Unknown => "unknown".to_string(),
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transport_starts_closed() {
        let transport = SerialTransport::new(SerialConfig::new("/dev/null-memolink"));
        assert!(!transport.is_open());
        assert!(transport.close_handle().is_closed());
        assert_eq!(transport.baud_rate(), crate::DEFAULT_BAUD_RATE);
    }

    #[test]
    fn io_on_closed_transport_fails_fast() {
        let mut transport = SerialTransport::new(SerialConfig::new("/dev/null-memolink"));
        assert!(matches!(transport.read(1), Err(TransportError::Closed)));
        assert!(matches!(
            transport.write_all(&[0x00]),
            Err(TransportError::Closed)
        ));
        assert!(matches!(transport.flush_input(), Err(TransportError::Closed)));
    }

    #[test]
    fn close_when_closed_is_noop_unless_forced() {
        let mut transport = SerialTransport::new(SerialConfig::new("/dev/null-memolink"));
        assert!(!transport.close(false));
        assert!(transport.close(true));
    }

    #[cfg(unix)]
    #[test]
    fn reopen_after_handle_close() {
        let (master, slave) = serialport::TTYPort::pair().expect("pty pair should open");
        let name = slave.name().expect("pty slave should have a name");
        drop(slave);

        let mut transport = SerialTransport::new(SerialConfig::new(name));
        transport.open().expect("first open should succeed");
        transport.close_handle().close();
        assert!(!transport.is_open());

        transport.open().expect("reopen after handle close should succeed");
        assert!(transport.is_open());
        assert!(transport.flush_input().is_ok());

        assert!(transport.close(false));
        drop(master);
    }

    #[test]
    fn open_missing_device_reports_no_connection() {
        let mut transport =
            SerialTransport::new(SerialConfig::new("/nonexistent/memolink-test-port"));
        let err = transport.open().unwrap_err();
        assert!(matches!(err, TransportError::NoConnection { .. }));
        assert!(err.is_no_connection());
        assert!(!transport.is_open());
    }
}
