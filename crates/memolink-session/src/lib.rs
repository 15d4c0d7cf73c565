//! Camera session: command protocol, ring-buffer extraction and the
//! single-flight worker.
//!
//! [`Session`] owns one [`SerialLink`](memolink_transport::SerialLink) and
//! runs every exchange synchronously. [`Camera`] moves a session onto its
//! own thread so a UI can queue requests and listen for [`Event`]s. With the
//! `async` feature, [`AsyncCamera`] offers the same over Tokio.

#[cfg(feature = "async")]
pub mod async_worker;
pub mod config;
pub mod error;
pub mod events;
pub mod ring;
pub mod session;
#[cfg(test)]
mod testing;
pub mod worker;

#[cfg(feature = "async")]
pub use async_worker::AsyncCamera;
pub use config::{MemoryMap, SessionConfig, DEFAULT_SETTLE_DELAY};
pub use error::{ErrorKind, Result, SessionError};
pub use events::{Event, Response};
pub use ring::{
    compute_bytes_used, RingGeometry, RingPointers, StorageMode, EXTRACT_CHUNK,
    PLACEHOLDER_HEADER,
};
pub use session::{CameraInfo, CurrentRoll, Session, MAX_READ_CHUNK};
pub use worker::{Camera, Request};
