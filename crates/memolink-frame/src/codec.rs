use bytes::{BufMut, BytesMut};

/// Reply start marker.
pub const STX: u8 = 0x02;

/// Reply end marker.
pub const ETX: u8 = 0x03;

/// Last byte of every 9-byte command frame.
pub const TERMINATOR: u8 = 0x03;

/// Read command: header (3) + space + address (2) + pad + length + terminator.
pub const READ_COMMAND_SIZE: usize = 9;

/// Single null byte that wakes the camera.
pub const WAKE_UP: [u8; 1] = [0x00];

/// Identity query ("S1000" + ENQ). Not framed.
pub const IDENTITY_QUERY: [u8; 6] = [0x53, 0x31, 0x30, 0x30, 0x30, 0x05];

/// Switch the camera to 9600 baud.
pub const BAUD_9600_COMMAND: [u8; 9] = [0x01, 0x20, 0x87, 0x05, 0x00, 0x00, 0x00, 0x00, TERMINATOR];

/// Acknowledgement the camera sends after [`BAUD_9600_COMMAND`].
pub const BAUD_9600_ACK: [u8; 2] = [0x06, 0x00];

/// Switch the camera back to 1200 baud.
pub const BAUD_1200_COMMAND: [u8; 2] = [0x04, 0x04];

/// Query first-roll number and length of the roll-data store.
pub const ROLL_DATA_INFO_QUERY: [u8; 9] =
    [0x01, 0x20, 0x1B, 0x92, 0x00, 0x00, 0x00, 0x00, TERMINATOR];

const READ_COMMAND_HEADER: [u8; 3] = [0x01, 0x20, 0x80];

/// Address space selector of a memory read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemorySpace {
    /// Main camera memory (settings, counters, ring bounds).
    Primary = 0x00,
    /// Secondary memory holding the roll-data ring buffer.
    RollData = 0x01,
}

impl MemorySpace {
    /// Wire code of the space.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Build a memory read command.
///
/// Wire format:
/// ```text
/// ┌────────────┬───────┬─────────┬─────────┬──────┬────────┬──────┐
/// │ 01 20 80   │ space │ addr_hi │ addr_lo │ 00   │ length │ 03   │
/// └────────────┴───────┴─────────┴─────────┴──────┴────────┴──────┘
/// ```
///
/// The address is big-endian here, unlike the little-endian values the
/// camera stores. Callers keep `length` at or below 0x80.
pub fn build_read_command(space: MemorySpace, address: u16, length: u8) -> [u8; READ_COMMAND_SIZE] {
    let [addr_hi, addr_lo] = address.to_be_bytes();
    [
        READ_COMMAND_HEADER[0],
        READ_COMMAND_HEADER[1],
        READ_COMMAND_HEADER[2],
        space.code(),
        addr_hi,
        addr_lo,
        0x00,
        length,
        TERMINATOR,
    ]
}

/// Sum of payload bytes modulo 256.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Encode a payload the way the camera frames its replies.
///
/// ```text
/// ┌──────┬─────────────┬──────────┬──────┐
/// │ STX  │ payload     │ checksum │ ETX  │
/// └──────┴─────────────┴──────────┴──────┘
/// ```
pub fn encode_packet(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len() + 3);
    dst.put_u8(STX);
    dst.put_slice(payload);
    dst.put_u8(checksum(payload));
    dst.put_u8(ETX);
}
