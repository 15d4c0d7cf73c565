/// Errors raised while decoding a roll blob or a frame record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The blob is too short to hold the roll header and trailer.
    #[error("roll blob too short ({len} bytes, need at least {min})")]
    BlobTooShort { len: usize, min: usize },

    /// The blob does not start with the roll marker.
    #[error("roll blob does not start with 58 5A")]
    MissingMarker,

    /// A frame record is shorter than the active record width.
    #[error("truncated frame record ({len} of {width} bytes)")]
    TruncatedRecord { len: usize, width: usize },

    /// The record width cannot hold shutter and aperture.
    #[error("unsupported frame record width {0}")]
    InvalidFrameSize(usize),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
