//! Code-to-label conversion tables.
//!
//! The camera stores every exposure setting as a one-byte code. The tables
//! are reverse-engineered, so they sit behind [`SettingsLookup`] and can be
//! replaced without touching the decoder.

/// Converts raw setting codes to display labels.
pub trait SettingsLookup: Send + Sync {
    fn shutter(&self, code: u8) -> String;
    fn aperture(&self, code: u8) -> String;
    fn focal_length(&self, code: u8) -> String;
    fn iso(&self, code: u8) -> String;
    /// `code` is the low nibble of the flags byte.
    fn exposure_mode(&self, code: u8) -> String;
    /// `code` is bits 4-5 of the flags byte.
    fn metering_mode(&self, code: u8) -> String;
    /// `code` is bits 6-7 of the flags byte.
    fn flash_mode(&self, code: u8) -> String;
    fn exposure_compensation(&self, code: u8) -> String;
}

/// APEX-style conversion used by F90-series bodies.
///
/// Shutter and aperture codes are in 1/8 EV steps: shutter 0x28 is 1 s,
/// aperture 0x08 is f/1.0. ISO codes index the 1/3-stop film speed series
/// from ISO 6. Exposure compensation is a signed count of 1/6 EV.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardLookup;

const SHUTTER_ONE_SECOND: i32 = 0x28;
const APERTURE_F1: i32 = 0x08;
const STEPS_PER_EV: f64 = 8.0;

const ISO_SERIES: [u16; 31] = [
    6, 8, 10, 12, 16, 20, 25, 32, 40, 50, 64, 80, 100, 125, 160, 200, 250, 320, 400, 500, 640,
    800, 1000, 1250, 1600, 2000, 2500, 3200, 4000, 5000, 6400,
];

impl SettingsLookup for StandardLookup {
    fn shutter(&self, code: u8) -> String {
        if code == 0 {
            return "Bulb".to_string();
        }
        let ev = f64::from(i32::from(code) - SHUTTER_ONE_SECOND) / STEPS_PER_EV;
        let seconds = (-ev).exp2();
        if seconds >= 1.0 {
            format!("{}s", seconds as u32)
        } else {
            format!("1/{}", (1.0 / seconds).round() as u32)
        }
    }

    fn aperture(&self, code: u8) -> String {
        if code == 0 {
            return "Unknown".to_string();
        }
        let av = f64::from(i32::from(code) - APERTURE_F1) / STEPS_PER_EV;
        format!("f/{:.1}", (av / 2.0).exp2())
    }

    fn focal_length(&self, code: u8) -> String {
        if code == 0 {
            return "Unknown".to_string();
        }
        format!("{code} mm")
    }

    fn iso(&self, code: u8) -> String {
        match ISO_SERIES.get(usize::from(code)) {
            Some(speed) => format!("ISO {speed}"),
            None => format!("ISO ? (0x{code:02X})"),
        }
    }

    fn exposure_mode(&self, code: u8) -> String {
        match code {
            0 => "Program".to_string(),
            1 => "Shutter priority".to_string(),
            2 => "Aperture priority".to_string(),
            3 => "Manual".to_string(),
            other => format!("Unknown ({other})"),
        }
    }

    fn metering_mode(&self, code: u8) -> String {
        match code {
            0 => "Matrix",
            1 => "Center-weighted",
            2 => "Spot",
            _ => "Unknown",
        }
        .to_string()
    }

    fn flash_mode(&self, code: u8) -> String {
        match code {
            0 => "Off",
            1 => "Front-curtain sync",
            2 => "Slow sync",
            _ => "Rear-curtain sync",
        }
        .to_string()
    }

    fn exposure_compensation(&self, code: u8) -> String {
        let sixths = code as i8;
        format!("{:+.1} EV", f64::from(sixths) / 6.0)
    }
}

/// Prints every code as hex. Useful when mapping new tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawLookup;

fn hex(code: u8) -> String {
    format!("0x{code:02X}")
}

impl SettingsLookup for RawLookup {
    fn shutter(&self, code: u8) -> String {
        hex(code)
    }

    fn aperture(&self, code: u8) -> String {
        hex(code)
    }

    fn focal_length(&self, code: u8) -> String {
        hex(code)
    }

    fn iso(&self, code: u8) -> String {
        hex(code)
    }

    fn exposure_mode(&self, code: u8) -> String {
        hex(code)
    }

    fn metering_mode(&self, code: u8) -> String {
        hex(code)
    }

    fn flash_mode(&self, code: u8) -> String {
        hex(code)
    }

    fn exposure_compensation(&self, code: u8) -> String {
        hex(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutter_codes() {
        let lookup = StandardLookup;
        assert_eq!(lookup.shutter(0x00), "Bulb");
        assert_eq!(lookup.shutter(0x28), "1s");
        assert_eq!(lookup.shutter(0x20), "2s");
        assert_eq!(lookup.shutter(0x40), "1/8");
        assert_eq!(lookup.shutter(0x60), "1/128");
    }

    #[test]
    fn aperture_codes() {
        let lookup = StandardLookup;
        assert_eq!(lookup.aperture(0x00), "Unknown");
        assert_eq!(lookup.aperture(0x08), "f/1.0");
        assert_eq!(lookup.aperture(0x10), "f/1.4");
        assert_eq!(lookup.aperture(0x18), "f/2.0");
        assert_eq!(lookup.aperture(0x28), "f/4.0");
        assert_eq!(lookup.aperture(0x38), "f/8.0");
    }

    #[test]
    fn iso_codes() {
        let lookup = StandardLookup;
        assert_eq!(lookup.iso(0), "ISO 6");
        assert_eq!(lookup.iso(12), "ISO 100");
        assert_eq!(lookup.iso(18), "ISO 400");
        assert_eq!(lookup.iso(30), "ISO 6400");
        assert_eq!(lookup.iso(0xC8), "ISO ? (0xC8)");
    }

    #[test]
    fn mode_codes() {
        let lookup = StandardLookup;
        assert_eq!(lookup.exposure_mode(2), "Aperture priority");
        assert_eq!(lookup.exposure_mode(9), "Unknown (9)");
        assert_eq!(lookup.metering_mode(2), "Spot");
        assert_eq!(lookup.flash_mode(3), "Rear-curtain sync");
        assert_eq!(lookup.focal_length(50), "50 mm");
    }

    #[test]
    fn exposure_compensation_is_signed_sixths() {
        let lookup = StandardLookup;
        assert_eq!(lookup.exposure_compensation(0x00), "+0.0 EV");
        assert_eq!(lookup.exposure_compensation(0x06), "+1.0 EV");
        assert_eq!(lookup.exposure_compensation(0xFA), "-1.0 EV");
        assert_eq!(lookup.exposure_compensation(0x03), "+0.5 EV");
    }

    #[test]
    fn raw_lookup_prints_hex() {
        assert_eq!(RawLookup.shutter(0x5A), "0x5A");
        assert_eq!(RawLookup.iso(0x07), "0x07");
    }
}
