//! Roll-data ring buffer geometry and extraction.
//!
//! The camera keeps frame records in a wrap-around region of secondary
//! memory bounded by `[ring_start, ring_end)`. Reading it takes two steps:
//! query the pointers, then pull `bytes_used` bytes from `start_ptr`,
//! wrapping at `ring_end`.

use memolink_frame::{MemorySpace, ROLL_DATA_INFO_QUERY};
use memolink_roll::{bcd_to_int, Roll, ROLL_MARKER};
use memolink_transport::SerialLink;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, Result, SessionError};
use crate::session::{le16, Session};

/// Largest read issued while extracting ring data.
pub const EXTRACT_CHUNK: usize = 0x20;

/// Stand-in header for an extract that starts mid-roll.
pub const PLACEHOLDER_HEADER: [u8; 4] = [ROLL_MARKER[0], ROLL_MARKER[1], 0x00, 0x00];

const STORAGE_MODE_MASK: u8 = 0x1F;
const MEMO_ENABLED_BIT: u8 = 0x40;
// The stored start pointer skips the 4-byte header of the oldest roll.
const START_HEADER_LEN: u16 = 4;

/// Record format selected in the camera menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Shutter and aperture.
    Minimum,
    /// Adds focal length and mode flags.
    Intermediate,
    /// Adds exposure and flash compensation.
    Maximum,
}

impl StorageMode {
    /// Mode for the low five bits of the settings byte.
    pub fn from_code(code: u8) -> Option<Self> {
        match code & STORAGE_MODE_MASK {
            0x0D => Some(Self::Minimum),
            0x0E => Some(Self::Intermediate),
            0x0F => Some(Self::Maximum),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Minimum => 0x0D,
            Self::Intermediate => 0x0E,
            Self::Maximum => 0x0F,
        }
    }

    /// Bytes per frame record.
    pub fn frame_size(self) -> usize {
        match self {
            Self::Minimum => 2,
            Self::Intermediate => 4,
            Self::Maximum => 6,
        }
    }
}

/// Raw pointer values read from the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingPointers {
    pub ring_start: u16,
    pub ring_end: u16,
    pub write_ptr: u16,
    /// Already moved back over the oldest roll header.
    pub start_ptr: u16,
    pub insert_ptr: u16,
}

/// Bytes between `start_ptr` and `insert_ptr`, following the ring wrap.
///
/// `start_ptr == ring_end` counts as empty even though the camera reports a
/// full ring there.
pub fn compute_bytes_used(p: &RingPointers) -> usize {
    let start = usize::from(p.start_ptr);
    let insert = usize::from(p.insert_ptr);
    let ring_start = usize::from(p.ring_start);
    let ring_end = usize::from(p.ring_end);

    if start == insert || start == ring_end {
        0
    } else if start < insert {
        insert - start
    } else {
        ring_end.saturating_sub(start) + insert.saturating_sub(ring_start)
    }
}

/// Immutable snapshot of the ring and memo-holder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RingGeometry {
    ring_start: u16,
    ring_end: u16,
    write_ptr: u16,
    start_ptr: u16,
    insert_ptr: u16,
    frame_size: usize,
    storage_mode: StorageMode,
    memo_enabled: bool,
    bytes_used: usize,
    first_roll_number: u16,
    first_roll_length: u16,
}

impl RingGeometry {
    /// Build a snapshot. Fails when the bounds are inverted.
    pub fn new(
        pointers: RingPointers,
        storage_mode: StorageMode,
        memo_enabled: bool,
        first_roll_number: u16,
        first_roll_length: u16,
    ) -> Result<Self> {
        if pointers.ring_start > pointers.ring_end {
            return Err(SessionError::InvalidGeometry {
                ring_start: pointers.ring_start,
                ring_end: pointers.ring_end,
            });
        }

        Ok(Self {
            ring_start: pointers.ring_start,
            ring_end: pointers.ring_end,
            write_ptr: pointers.write_ptr,
            start_ptr: pointers.start_ptr,
            insert_ptr: pointers.insert_ptr,
            frame_size: storage_mode.frame_size(),
            storage_mode,
            memo_enabled,
            bytes_used: compute_bytes_used(&pointers),
            first_roll_number,
            first_roll_length,
        })
    }

    pub fn ring_start(&self) -> u16 {
        self.ring_start
    }

    pub fn ring_end(&self) -> u16 {
        self.ring_end
    }

    pub fn write_ptr(&self) -> u16 {
        self.write_ptr
    }

    pub fn start_ptr(&self) -> u16 {
        self.start_ptr
    }

    pub fn insert_ptr(&self) -> u16 {
        self.insert_ptr
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.storage_mode
    }

    pub fn memo_enabled(&self) -> bool {
        self.memo_enabled
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn first_roll_number(&self) -> u16 {
        self.first_roll_number
    }

    pub fn first_roll_length(&self) -> u16 {
        self.first_roll_length
    }

    /// Move `ptr` forward by `chunk` bytes, wrapping inside the ring.
    pub fn advance(&self, ptr: u16, chunk: usize) -> u16 {
        let start = i64::from(self.ring_start);
        let span = i64::from(self.ring_end) - start;
        if span <= 0 {
            return self.ring_start;
        }
        let offset = (i64::from(ptr) - start + chunk as i64).rem_euclid(span);
        (start + offset) as u16
    }

    /// Bytes that can be read from `ptr` before the ring wraps.
    fn until_wrap(&self, ptr: u16) -> usize {
        if ptr >= self.ring_end || ptr < self.ring_start {
            EXTRACT_CHUNK
        } else {
            usize::from(self.ring_end - ptr)
        }
    }
}

impl<L: SerialLink> Session<L> {
    /// Read the ring pointers and memo settings.
    ///
    /// The snapshot is cached on success. A timeout drops any cached
    /// snapshot.
    pub fn query_geometry(&mut self) -> Result<RingGeometry> {
        match self.fetch_geometry() {
            Ok(geometry) => {
                self.geometry = Some(geometry.clone());
                Ok(geometry)
            }
            Err(err) => {
                if err.kind() == ErrorKind::NoResponse {
                    self.geometry = None;
                }
                Err(err)
            }
        }
    }

    fn fetch_geometry(&mut self) -> Result<RingGeometry> {
        debug!("querying roll data geometry");
        let map = self.config.memory_map;

        self.link.flush_input()?;
        self.link.write_all(&ROLL_DATA_INFO_QUERY)?;
        let info = self.reader.read_packet(&mut self.link)?;
        let (Some(&ones), Some(&hundreds), Some(first_roll_length)) =
            (info.first(), info.get(1), le16(&info, 2))
        else {
            return Err(short_reply("roll data info", info.len()));
        };
        let first_roll_number = u16::from(bcd_to_int(ones)) + u16::from(bcd_to_int(hundreds)) * 100;

        let bounds = self.read_data(MemorySpace::Primary, map.ring_bounds_addr, 4)?;
        let (Some(ring_start), Some(ring_end)) = (le16(&bounds, 0), le16(&bounds, 2)) else {
            return Err(short_reply("ring bounds", bounds.len()));
        };

        let settings = self.read_data(MemorySpace::Primary, map.memo_settings_addr, 8)?;
        let (Some(&mode), Some(write_ptr), Some(start_ptr), Some(insert_ptr)) = (
            settings.first(),
            le16(&settings, 2),
            le16(&settings, 4),
            le16(&settings, 6),
        ) else {
            return Err(short_reply("memo settings", settings.len()));
        };

        let storage_mode = StorageMode::from_code(mode)
            .ok_or(SessionError::UnsupportedStorageMode(mode & STORAGE_MODE_MASK))?;
        let pointers = RingPointers {
            ring_start,
            ring_end,
            write_ptr,
            start_ptr: start_ptr.wrapping_sub(START_HEADER_LEN),
            insert_ptr,
        };
        let geometry = RingGeometry::new(
            pointers,
            storage_mode,
            mode & MEMO_ENABLED_BIT != 0,
            first_roll_number,
            first_roll_length,
        )?;

        debug!(
            ring_start,
            ring_end,
            write_ptr,
            start_ptr = pointers.start_ptr,
            insert_ptr,
            ?storage_mode,
            memo_enabled = geometry.memo_enabled(),
            bytes_used = geometry.bytes_used(),
            "roll data geometry"
        );
        Ok(geometry)
    }

    /// Read the used part of the ring.
    ///
    /// Chunks never cross `ring_end`. Progress (0-100) is reported after each
    /// chunk. The result always starts with a roll marker unless it is
    /// empty.
    pub fn extract_payload(
        &mut self,
        geometry: &RingGeometry,
        mut progress: impl FnMut(u8),
    ) -> Result<Vec<u8>> {
        let used = geometry.bytes_used();
        if used == 0 {
            progress(100);
            return Ok(Vec::new());
        }

        let mut content = Vec::with_capacity(used + PLACEHOLDER_HEADER.len());
        let mut ptr = geometry.start_ptr();
        let mut consumed = 0usize;
        let started = std::time::Instant::now();

        while consumed < used {
            let length = EXTRACT_CHUNK
                .min(used - consumed)
                .min(geometry.until_wrap(ptr));
            let chunk = self.read_data(MemorySpace::RollData, ptr, length)?;
            content.extend_from_slice(&chunk);

            consumed += length;
            ptr = geometry.advance(ptr, length);
            progress((100 * consumed / used) as u8);
        }
        info!(bytes = content.len(), elapsed = ?started.elapsed(), "ring data extracted");

        if !content.starts_with(&ROLL_MARKER) {
            warn!("ring data does not start with a roll marker; adding placeholder header");
            let mut framed = PLACEHOLDER_HEADER.to_vec();
            framed.extend_from_slice(&content);
            return Ok(framed);
        }
        Ok(content)
    }

    /// Extract and decode every roll in the ring.
    ///
    /// Uses the cached geometry, querying it first when none is cached.
    pub fn download_rolls(&mut self, progress: impl FnMut(u8)) -> Result<Vec<Roll>> {
        let geometry = match self.geometry.clone() {
            Some(geometry) => geometry,
            None => self.query_geometry()?,
        };

        let raw = self.extract_payload(&geometry, progress)?;
        let decoder = match self.model() {
            Some(model) if !model.is_empty() => self.config.decoder.clone().model(model),
            _ => self.config.decoder.clone(),
        };
        let rolls = decoder.decode_rolls(&raw, geometry.frame_size());
        info!(rolls = rolls.len(), "roll data decoded");
        Ok(rolls)
    }
}

fn short_reply(what: &str, len: usize) -> SessionError {
    SessionError::NoResponse(format!("short {what} reply ({len} bytes)"))
}
