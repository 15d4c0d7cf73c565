use serde::{Deserialize, Serialize};

/// One exposed frame.
///
/// Fields past shutter and aperture only exist for wider record formats and
/// are left out of serialized output when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Position within the roll, from 1.
    pub index: u32,
    pub shutter: String,
    pub aperture: String,
    pub iso: String,
    pub make: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub focal_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exposure_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metering_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flash_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exposure_compensation: Option<String>,
}

/// A decoded roll of film.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roll {
    pub roll_number: u16,
    pub iso: String,
    pub frames: Vec<Frame>,
    /// Free text owned by the caller; empty after decoding.
    #[serde(default)]
    pub description: String,
}

impl Roll {
    /// Number of decoded frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl std::fmt::Display for Roll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Roll {} ({}) - {} frames",
            self.roll_number,
            self.iso,
            self.frames.len()
        )
    }
}
