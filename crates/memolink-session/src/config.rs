use std::time::Duration;

use memolink_roll::RollDecoder;

/// Pause after wake-up and baud switches before the line is trusted.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Addresses in primary memory that the session reads.
///
/// The defaults match F90X bodies as mapped so far; every field can be
/// overridden when a unit turns out to differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    /// Lifetime shutter count, LE16.
    pub total_shots_addr: u16,
    /// Current roll number, two BCD bytes.
    pub roll_number_addr: u16,
    /// Current frame counter, one byte.
    pub frame_number_addr: u16,
    /// Ring start and end, two LE16 values.
    pub ring_bounds_addr: u16,
    /// 8-byte memo-holder settings block.
    pub memo_settings_addr: u16,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self {
            total_shots_addr: 0xFD40,
            roll_number_addr: 0xFD44,
            frame_number_addr: 0xFD46,
            ring_bounds_addr: 0xFE00,
            memo_settings_addr: 0xFE08,
        }
    }
}

/// Session behaviour on top of the serial configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub memory_map: MemoryMap,
    /// Default: 200 ms.
    pub settle_delay: Duration,
    /// Switch to 9600 baud during init. Default: true.
    pub high_speed: bool,
    /// Decoder for downloaded rolls. The camera's reported model replaces
    /// the decoder's model once known.
    pub decoder: RollDecoder,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            memory_map: MemoryMap::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            high_speed: true,
            decoder: RollDecoder::default(),
        }
    }
}
