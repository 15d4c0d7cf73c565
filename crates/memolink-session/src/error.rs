use memolink_frame::FrameError;
use memolink_transport::TransportError;
use serde::Serialize;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The camera answered too little or too late.
    #[error("no response from camera: {0}")]
    NoResponse(String),

    /// A memory read reply carried a different number of bytes than asked.
    #[error("reply for 0x{address:04X} has {received} bytes, expected {requested}")]
    PacketLength {
        address: u16,
        requested: usize,
        received: usize,
    },

    /// The settings block names a storage mode this decoder does not know.
    #[error("unsupported storage mode 0x{0:02X}")]
    UnsupportedStorageMode(u8),

    /// Ring bounds read back inverted.
    #[error("invalid ring bounds (start 0x{ring_start:04X}, end 0x{ring_end:04X})")]
    InvalidGeometry { ring_start: u16, ring_end: u16 },

    /// The worker thread has exited.
    #[error("camera worker is gone")]
    WorkerGone,
}

/// Coarse error class reported to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoConnection,
    NoResponse,
    InvalidChecksum,
    InvalidData,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoConnection => "no connection",
            Self::NoResponse => "no response",
            Self::InvalidChecksum => "invalid checksum",
            Self::InvalidData => "invalid data",
        })
    }
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::WorkerGone => ErrorKind::NoConnection,
            Self::Frame(FrameError::NoResponse { .. }) | Self::NoResponse(_) => {
                ErrorKind::NoResponse
            }
            Self::Frame(FrameError::InvalidChecksum { .. }) | Self::PacketLength { .. } => {
                ErrorKind::InvalidChecksum
            }
            Self::Frame(FrameError::Transport(_)) => ErrorKind::NoConnection,
            Self::UnsupportedStorageMode(_) | Self::InvalidGeometry { .. } => {
                ErrorKind::InvalidData
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
