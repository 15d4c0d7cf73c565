/// Errors that can occur in serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The serial device could not be opened.
    #[error("failed to open serial port {port}: {source}")]
    NoConnection {
        port: String,
        source: serialport::Error,
    },

    /// The channel is closed (never opened, closed, or cancelled).
    #[error("serial port is not open")]
    Closed,

    /// An I/O error occurred on the serial stream.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial driver rejected a control operation.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl TransportError {
    /// Returns true if the error means there is no usable channel.
    pub fn is_no_connection(&self) -> bool {
        matches!(self, Self::NoConnection { .. } | Self::Closed)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
