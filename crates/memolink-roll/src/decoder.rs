use std::sync::Arc;

use tracing::debug;

use crate::error::{DecodeError, Result};
use crate::lookup::{SettingsLookup, StandardLookup};
use crate::model::{Frame, Roll};

/// Marker that opens every roll blob.
pub const ROLL_MARKER: [u8; 2] = [0x58, 0x5A];

/// Byte that precedes the ISO code at the end of a roll blob.
pub const ROLL_TERMINATOR: u8 = 0xFF;

pub const DEFAULT_MAKE: &str = "Nikon";
pub const DEFAULT_MODEL: &str = "F90X";

// marker (2) + header word (2) + BCD roll number (2)
const ROLL_HEADER_LEN: usize = 6;
// terminator + ISO
const ROLL_TRAILER_LEN: usize = 2;
const MIN_RECORD_LEN: usize = 2;

/// Decode one packed BCD byte (`0x42` is 42).
pub fn bcd_to_int(byte: u8) -> u8 {
    (byte >> 4) * 10 + (byte & 0x0F)
}

/// Split a ring extract into roll blobs.
///
/// Each blob runs from a `58 5A` marker through the next `0xFF` and the ISO
/// byte after it. A marker with no terminator takes the rest of the buffer.
pub fn split_rolls(raw: &[u8]) -> Vec<&[u8]> {
    let mut rolls = Vec::new();
    let mut idx = 0usize;

    while idx < raw.len() {
        let Some(start) = find_marker(raw, idx) else {
            break;
        };
        match raw[start + ROLL_MARKER.len()..]
            .iter()
            .position(|b| *b == ROLL_TERMINATOR)
        {
            Some(offset) => {
                let end = (start + ROLL_MARKER.len() + offset + ROLL_TRAILER_LEN).min(raw.len());
                rolls.push(&raw[start..end]);
                idx = end;
            }
            None => {
                rolls.push(&raw[start..]);
                break;
            }
        }
    }

    rolls
}

fn find_marker(raw: &[u8], from: usize) -> Option<usize> {
    raw.get(from..)?
        .windows(ROLL_MARKER.len())
        .position(|w| w == ROLL_MARKER)
        .map(|pos| from + pos)
}

/// Decode one roll blob.
///
/// ```text
/// ┌───────┬─────────────┬──────────────┬──────────────────┬──────┬─────┐
/// │ 58 5A │ header (2)  │ roll BCD (2) │ records...       │ FF   │ ISO │
/// └───────┴─────────────┴──────────────┴──────────────────┴──────┴─────┘
/// ```
///
/// Records shorter than the width are skipped; a trailing fragment under two
/// bytes is dropped without comment.
pub fn decode_roll(
    blob: &[u8],
    frame_size: usize,
    lookup: &dyn SettingsLookup,
    make: &str,
    model: &str,
) -> Result<Roll> {
    if frame_size < MIN_RECORD_LEN {
        return Err(DecodeError::InvalidFrameSize(frame_size));
    }
    let min = ROLL_HEADER_LEN + ROLL_TRAILER_LEN;
    if blob.len() < min {
        return Err(DecodeError::BlobTooShort {
            len: blob.len(),
            min,
        });
    }
    if blob[..2] != ROLL_MARKER {
        return Err(DecodeError::MissingMarker);
    }

    let roll_number = u16::from(bcd_to_int(blob[4])) + u16::from(bcd_to_int(blob[5])) * 100;
    let iso = lookup.iso(blob[blob.len() - 1]);
    let records = &blob[ROLL_HEADER_LEN..blob.len() - ROLL_TRAILER_LEN];

    let mut frames = Vec::with_capacity(records.len() / frame_size);
    for (position, record) in records.chunks(frame_size).enumerate() {
        if record.len() < MIN_RECORD_LEN {
            break;
        }
        let index = frames.len() as u32 + 1;
        match decode_frame(record, frame_size, index, &iso, lookup, make, model) {
            Ok(frame) => frames.push(frame),
            Err(err) => debug!(roll_number, position, error = %err, "skipping frame record"),
        }
    }

    Ok(Roll {
        roll_number,
        iso,
        frames,
        description: String::new(),
    })
}

fn decode_frame(
    record: &[u8],
    width: usize,
    index: u32,
    iso: &str,
    lookup: &dyn SettingsLookup,
    make: &str,
    model: &str,
) -> Result<Frame> {
    if record.len() < width {
        return Err(DecodeError::TruncatedRecord {
            len: record.len(),
            width,
        });
    }

    let mut frame = Frame {
        index,
        shutter: lookup.shutter(record[0]),
        aperture: lookup.aperture(record[1]),
        iso: iso.to_string(),
        make: make.to_string(),
        model: model.to_string(),
        focal_length: None,
        exposure_mode: None,
        metering_mode: None,
        flash_mode: None,
        exposure_compensation: None,
    };

    if width >= 4 {
        let flags = record[2];
        frame.focal_length = Some(lookup.focal_length(record[3]));
        frame.exposure_mode = Some(lookup.exposure_mode(flags & 0x0F));
        frame.metering_mode = Some(lookup.metering_mode((flags >> 4) & 0x03));
        frame.flash_mode = Some(lookup.flash_mode((flags >> 6) & 0x03));
    }
    if width >= 6 {
        frame.exposure_compensation = Some(lookup.exposure_compensation(record[4]));
    }

    Ok(frame)
}

/// Split a ring extract and decode every roll in it.
///
/// Blobs that cannot be decoded at all are logged and left out.
pub fn decode_rolls(
    raw: &[u8],
    frame_size: usize,
    lookup: &dyn SettingsLookup,
    make: &str,
    model: &str,
) -> Vec<Roll> {
    split_rolls(raw)
        .into_iter()
        .filter_map(|blob| match decode_roll(blob, frame_size, lookup, make, model) {
            Ok(roll) => Some(roll),
            Err(err) => {
                debug!(len = blob.len(), error = %err, "skipping roll blob");
                None
            }
        })
        .collect()
}

/// Decoder bound to a lookup table and camera identity.
#[derive(Clone)]
pub struct RollDecoder {
    lookup: Arc<dyn SettingsLookup>,
    make: String,
    model: String,
}

impl RollDecoder {
    /// Decoder with [`StandardLookup`] and the default make and model.
    pub fn new() -> Self {
        Self::with_lookup(Arc::new(StandardLookup))
    }

    /// Decoder with an explicit lookup table.
    pub fn with_lookup(lookup: Arc<dyn SettingsLookup>) -> Self {
        Self {
            lookup,
            make: DEFAULT_MAKE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Set the make written into each frame.
    pub fn make(mut self, make: impl Into<String>) -> Self {
        self.make = make.into();
        self
    }

    /// Set the model written into each frame.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn camera_make(&self) -> &str {
        &self.make
    }

    pub fn camera_model(&self) -> &str {
        &self.model
    }

    pub fn decode_roll(&self, blob: &[u8], frame_size: usize) -> Result<Roll> {
        decode_roll(blob, frame_size, self.lookup.as_ref(), &self.make, &self.model)
    }

    pub fn decode_rolls(&self, raw: &[u8], frame_size: usize) -> Vec<Roll> {
        decode_rolls(raw, frame_size, self.lookup.as_ref(), &self.make, &self.model)
    }
}

impl Default for RollDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RollDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollDecoder")
            .field("make", &self.make)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::RawLookup;

    const ISO_100: u8 = 12;

    fn blob(roll: [u8; 2], records: &[u8], iso: u8) -> Vec<u8> {
        let mut out = vec![0x58, 0x5A, 0x10, 0x00, roll[0], roll[1]];
        out.extend_from_slice(records);
        out.extend_from_slice(&[ROLL_TERMINATOR, iso]);
        out
    }

    #[test]
    fn bcd_decoding() {
        assert_eq!(bcd_to_int(0x42), 42);
        assert_eq!(bcd_to_int(0x00), 0);
        assert_eq!(bcd_to_int(0x99), 99);
        assert_eq!(
            u16::from(bcd_to_int(0x25)) + u16::from(bcd_to_int(0x01)) * 100,
            125
        );
    }

    #[test]
    fn split_single_blob_is_identity() {
        let one = blob([0x01, 0x00], &[0x60, 0x38, 0x60, 0x38], ISO_100);
        let parts = split_rolls(&one);
        assert_eq!(parts, vec![one.as_slice()]);

        let again = split_rolls(parts[0]);
        assert_eq!(again, vec![one.as_slice()]);
    }

    #[test]
    fn split_multiple_blobs_in_order() {
        let a = blob([0x01, 0x00], &[0x60, 0x38], ISO_100);
        let b = blob([0x02, 0x00], &[0x50, 0x30], ISO_100);
        let mut raw = a.clone();
        raw.extend_from_slice(&[0x00, 0x00]);
        raw.extend_from_slice(&b);

        assert_eq!(split_rolls(&raw), vec![a.as_slice(), b.as_slice()]);
    }

    #[test]
    fn split_keeps_unterminated_tail() {
        let a = blob([0x01, 0x00], &[0x60, 0x38], ISO_100);
        let mut raw = a.clone();
        raw.extend_from_slice(&[0x58, 0x5A, 0x10, 0x00, 0x02, 0x00, 0x60]);

        let parts = split_rolls(&raw);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], a.as_slice());
        assert_eq!(parts[1], &[0x58, 0x5A, 0x10, 0x00, 0x02, 0x00, 0x60]);
    }

    #[test]
    fn split_terminator_at_end_of_buffer() {
        let raw = [0x58, 0x5A, 0x60, ROLL_TERMINATOR];
        assert_eq!(split_rolls(&raw), vec![raw.as_slice()]);
    }

    #[test]
    fn split_without_marker_is_empty() {
        assert!(split_rolls(&[0x00, 0x01, 0xFF, 0x0C]).is_empty());
        assert!(split_rolls(&[]).is_empty());
    }

    #[test]
    fn decode_four_byte_record() {
        // program, spot metering, slow sync
        let flags = 0b1010_0000;
        let raw = blob([0x25, 0x01], &[0x60, 0x38, flags, 50], ISO_100);

        let roll = RollDecoder::new().decode_roll(&raw, 4).unwrap();
        assert_eq!(roll.roll_number, 125);
        assert_eq!(roll.iso, "ISO 100");
        assert_eq!(roll.frames.len(), 1);

        let frame = &roll.frames[0];
        assert_eq!(frame.index, 1);
        assert_eq!(frame.shutter, "1/128");
        assert_eq!(frame.aperture, "f/8.0");
        assert_eq!(frame.focal_length.as_deref(), Some("50 mm"));
        assert_eq!(frame.exposure_mode.as_deref(), Some("Program"));
        assert_eq!(frame.metering_mode.as_deref(), Some("Spot"));
        assert_eq!(frame.flash_mode.as_deref(), Some("Slow sync"));
        assert_eq!(frame.exposure_compensation, None);
        assert_eq!(frame.make, DEFAULT_MAKE);
        assert_eq!(frame.model, DEFAULT_MODEL);
    }

    #[test]
    fn bit_fields_map_to_lookup_codes() {
        let flags = 0b0111_0010;
        let raw = blob([0x01, 0x00], &[0x01, 0x02, flags, 0x04], ISO_100);

        let roll = RollDecoder::with_lookup(Arc::new(RawLookup))
            .decode_roll(&raw, 4)
            .unwrap();
        let frame = &roll.frames[0];
        assert_eq!(frame.exposure_mode.as_deref(), Some("0x02"));
        assert_eq!(frame.metering_mode.as_deref(), Some("0x03"));
        assert_eq!(frame.flash_mode.as_deref(), Some("0x01"));
        assert_eq!(frame.focal_length.as_deref(), Some("0x04"));
    }

    #[test]
    fn two_byte_records_only_carry_shutter_and_aperture() {
        let raw = blob([0x07, 0x00], &[0x60, 0x38, 0x58, 0x30], ISO_100);

        let roll = RollDecoder::new().decode_roll(&raw, 2).unwrap();
        assert_eq!(roll.frames.len(), 2);
        assert_eq!(roll.frames[1].index, 2);
        assert!(roll.frames.iter().all(|f| f.focal_length.is_none()));
    }

    #[test]
    fn six_byte_records_carry_compensation() {
        let raw = blob([0x01, 0x00], &[0x60, 0x38, 0x00, 85, 0xFA, 0x00], ISO_100);

        let roll = RollDecoder::new().decode_roll(&raw, 6).unwrap();
        let frame = &roll.frames[0];
        assert_eq!(frame.focal_length.as_deref(), Some("85 mm"));
        assert_eq!(frame.exposure_compensation.as_deref(), Some("-1.0 EV"));
    }

    #[test]
    fn truncated_record_is_skipped() {
        // one full record then a 3-byte fragment
        let raw = blob([0x01, 0x00], &[0x60, 0x38, 0x00, 50, 0x58, 0x30, 0x00], ISO_100);

        let roll = RollDecoder::new().decode_roll(&raw, 4).unwrap();
        assert_eq!(roll.frames.len(), 1);
        assert_eq!(roll.frames[0].index, 1);
    }

    #[test]
    fn single_byte_fragment_is_dropped() {
        let raw = blob([0x01, 0x00], &[0x60, 0x38, 0x00, 50, 0x58], ISO_100);

        let roll = RollDecoder::new().decode_roll(&raw, 4).unwrap();
        assert_eq!(roll.frames.len(), 1);
    }

    #[test]
    fn short_blob_is_rejected() {
        let err = RollDecoder::new()
            .decode_roll(&[0x58, 0x5A, 0xFF, 0x0C], 4)
            .unwrap_err();
        assert_eq!(err, DecodeError::BlobTooShort { len: 4, min: 8 });
    }

    #[test]
    fn zero_frame_size_is_rejected() {
        let raw = blob([0x01, 0x00], &[], ISO_100);
        assert_eq!(
            RollDecoder::new().decode_roll(&raw, 0).unwrap_err(),
            DecodeError::InvalidFrameSize(0)
        );
    }

    #[test]
    fn custom_make_and_model() {
        let raw = blob([0x01, 0x00], &[0x60, 0x38], ISO_100);
        let roll = RollDecoder::new()
            .make("Nikon Corp.")
            .model("F90")
            .decode_roll(&raw, 2)
            .unwrap();
        assert_eq!(roll.frames[0].make, "Nikon Corp.");
        assert_eq!(roll.frames[0].model, "F90");
    }

    #[test]
    fn extract_with_one_roll_yields_eight_frames() {
        let mut records = Vec::new();
        for i in 0..8u8 {
            records.extend_from_slice(&[0x50 + i, 0x30, 0x11, 35 + i]);
        }
        let one = blob([0x42, 0x00], &records, ISO_100);
        let mut raw = one.clone();
        raw.resize(64, 0x00);
        assert_eq!(raw.len(), 64);

        let rolls = RollDecoder::new().decode_rolls(&raw, 4);
        assert_eq!(rolls.len(), 1);
        assert_eq!(rolls[0].roll_number, 42);
        let indices: Vec<u32> = rolls[0].frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, (1..=8).collect::<Vec<_>>());
        assert_eq!(rolls[0].frames[7].focal_length.as_deref(), Some("42 mm"));
    }

    #[test]
    fn undecodable_blob_is_left_out() {
        let good = blob([0x03, 0x00], &[0x60, 0x38], ISO_100);
        let mut raw = vec![0x58, 0x5A, 0xFF, 0x0C];
        raw.extend_from_slice(&good);

        let rolls = RollDecoder::new().decode_rolls(&raw, 2);
        assert_eq!(rolls.len(), 1);
        assert_eq!(rolls[0].roll_number, 3);
    }
}
