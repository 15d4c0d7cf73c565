//! Command framing and checksummed reply packets.
//!
//! Outbound commands are fixed-size byte frames. Every reply the camera
//! sends back is framed as:
//! - a start marker (STX, `0x02`)
//! - the payload
//! - a one-byte checksum (sum of payload bytes modulo 256)
//! - an end marker (ETX, `0x03`)
//!
//! [`PacketReader`] turns the raw byte stream of a [`SerialLink`] into
//! validated payloads.
//!
//! [`SerialLink`]: memolink_transport::SerialLink

pub mod codec;
pub mod error;
pub mod reader;

pub use codec::{
    build_read_command, checksum, encode_packet, MemorySpace, BAUD_1200_COMMAND,
    BAUD_9600_ACK, BAUD_9600_COMMAND, ETX, IDENTITY_QUERY, READ_COMMAND_SIZE,
    ROLL_DATA_INFO_QUERY, STX, TERMINATOR, WAKE_UP,
};
pub use error::{FrameError, Result};
pub use reader::{PacketReader, Phase};
