use std::time::Duration;

/// Baud rate the camera listens on after wake-up.
pub const DEFAULT_BAUD_RATE: u32 = 1200;

/// Default timeout for blocking reads and multi-chunk operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for one serial connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port identifier (e.g. `/dev/ttyUSB0`, `COM3`).
    pub port: String,
    /// Initial baud rate. Default: 1200.
    pub baud_rate: u32,
    /// Read timeout. Default: 2 s.
    pub timeout: Duration,
}

impl SerialConfig {
    /// Configuration for `port` with default rate and timeout.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
