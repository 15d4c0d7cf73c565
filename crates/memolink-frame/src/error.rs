use std::time::Duration;

use crate::reader::Phase;

/// Errors that can occur while reading a reply packet.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The camera did not complete a packet within the timeout.
    #[error("no response from camera while {phase} (timeout {timeout:?})")]
    NoResponse { phase: Phase, timeout: Duration },

    /// The checksum byte does not match the payload.
    #[error("invalid checksum (expected 0x{expected:02X}, got 0x{actual:02X})")]
    InvalidChecksum { expected: u8, actual: u8 },

    /// The underlying serial link failed.
    #[error(transparent)]
    Transport(#[from] memolink_transport::TransportError),
}

impl FrameError {
    /// Whether this is a timeout-class failure.
    pub fn is_no_response(&self) -> bool {
        matches!(self, Self::NoResponse { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
