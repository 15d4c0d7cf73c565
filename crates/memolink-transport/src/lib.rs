//! Serial channel abstraction for memo-holder camera links.
//!
//! This is the lowest layer of memolink. It owns the physical serial
//! channel and knows nothing about the camera protocol:
//! - open/close with a configured baud rate and timeout
//! - timed raw reads and writes
//! - input-buffer flush
//! - baud-rate change on an open channel
//!
//! Everything else builds on top of the [`SerialLink`] trait provided here.

pub mod config;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod serial;
pub mod traits;

pub use config::{SerialConfig, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT};
pub use error::{Result, TransportError};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockLink;
pub use serial::{available_ports, PortInfo, SerialTransport};
pub use traits::{CloseHandle, SerialLink};
