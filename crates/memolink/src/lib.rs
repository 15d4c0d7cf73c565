//! Film-roll exposure data from Nikon F90/F90X memo holders.
//!
//! memolink talks to the camera over a serial link, walks the data-back ring
//! buffer and decodes it into rolls of per-frame exposure settings.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial channel abstraction
//! - [`frame`]: command builders and the STX/ETX packet reader
//! - [`roll`]: offline roll decoder and settings lookups
//! - [`session`]: command protocol, ring extraction and the camera worker

/// Re-export transport types.
pub mod transport {
    pub use memolink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use memolink_frame::*;
}

/// Re-export roll decoder types.
pub mod roll {
    pub use memolink_roll::*;
}

/// Re-export session types.
pub mod session {
    pub use memolink_session::*;
}
