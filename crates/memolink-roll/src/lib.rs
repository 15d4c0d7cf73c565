//! Roll and frame telemetry decoding.
//!
//! Turns the byte stream extracted from the camera's roll-data ring into
//! [`Roll`] records. Code-to-label conversion goes through the
//! [`SettingsLookup`] trait so the tables can be swapped.

pub mod decoder;
pub mod error;
pub mod lookup;
pub mod model;

pub use decoder::{
    bcd_to_int, decode_roll, decode_rolls, split_rolls, RollDecoder, DEFAULT_MAKE, DEFAULT_MODEL,
    ROLL_MARKER, ROLL_TERMINATOR,
};
pub use error::{DecodeError, Result};
pub use lookup::{RawLookup, SettingsLookup, StandardLookup};
pub use model::{Frame, Roll};
