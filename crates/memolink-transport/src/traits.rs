use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// A half-duplex byte channel to the camera.
///
/// Implemented by [`SerialTransport`](crate::SerialTransport) for real
/// hardware and by `MockLink` (feature `mock`) for tests.
pub trait SerialLink {
    /// Establish the channel at the configured baud rate and timeout.
    fn open(&mut self) -> Result<()>;

    /// Release the channel.
    ///
    /// Returns `false` (and only logs a warning) when the channel was already
    /// closed and `force` is not set.
    fn close(&mut self, force: bool) -> bool;

    /// Whether the channel is open and has not been cancelled.
    fn is_open(&self) -> bool;

    /// Write all bytes (blocking).
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read up to `n` bytes within the configured timeout.
    ///
    /// A short result is not an error; it is exactly what arrived in time.
    fn read(&mut self, n: usize) -> Result<Vec<u8>>;

    /// Discard any unread buffered input.
    fn flush_input(&mut self) -> Result<()>;

    /// Change the rate of the open channel without reopening it.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    /// Current baud rate.
    fn baud_rate(&self) -> u32;

    /// Configured read timeout.
    fn timeout(&self) -> Duration;

    /// Handle that can close the channel from another thread.
    fn close_handle(&self) -> CloseHandle;
}

impl<L: SerialLink + ?Sized> SerialLink for Box<L> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self, force: bool) -> bool {
        (**self).close(force)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        (**self).read(n)
    }

    fn flush_input(&mut self) -> Result<()> {
        (**self).flush_input()
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        (**self).set_baud_rate(baud_rate)
    }

    fn baud_rate(&self) -> u32 {
        (**self).baud_rate()
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn close_handle(&self) -> CloseHandle {
        (**self).close_handle()
    }
}

/// Cross-thread close flag shared with a link.
///
/// Closing through the handle makes every further read or write on the link
/// fail fast with [`TransportError::Closed`](crate::TransportError::Closed).
/// The link itself releases the device on its next `close`.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
}

impl CloseHandle {
    pub(crate) fn new(closed: bool) -> Self {
        Self {
            closed: Arc::new(AtomicBool::new(closed)),
        }
    }

    /// Mark the link closed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether the link has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_visible_through_clones() {
        let handle = CloseHandle::new(false);
        let other = handle.clone();
        assert!(!other.is_closed());

        handle.close();
        assert!(other.is_closed());

        other.reopen();
        assert!(!handle.is_closed());
    }
}
