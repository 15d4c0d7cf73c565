use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use memolink_transport::SerialLink;
use tracing::{debug, trace};

use crate::codec::{checksum, ETX, STX};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 0x100;

/// Stage of the packet state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Discarding bytes until STX.
    WaitStart,
    /// Collecting bytes until ETX.
    Accumulate,
    /// Checking the trailing checksum byte.
    Validate,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::WaitStart => "waiting for packet start",
            Self::Accumulate => "reading packet body",
            Self::Validate => "validating packet",
        })
    }
}

/// Reads one checksummed reply packet at a time from a [`SerialLink`].
///
/// Bytes are pulled one at a time so nothing past ETX is consumed. Each of
/// the two waiting phases runs against its own timeout.
#[derive(Debug)]
pub struct PacketReader {
    buf: BytesMut,
    timeout: Option<Duration>,
}

impl PacketReader {
    /// Create a reader that uses the link's configured timeout per phase.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            timeout: None,
        }
    }

    /// Create a reader with an explicit per-phase timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new()
        }
    }

    /// Per-phase timeout override, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Read the next packet and return its payload.
    ///
    /// Markers and the checksum byte are stripped.
    pub fn read_packet<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> Result<Bytes> {
        let timeout = self.timeout.unwrap_or_else(|| link.timeout());
        self.buf.clear();

        self.wait_start(link, timeout)?;
        self.accumulate(link, timeout)?;
        self.validate(timeout)
    }

    fn wait_start<L: SerialLink + ?Sized>(&mut self, link: &mut L, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut skipped = 0usize;
        loop {
            if let Some(byte) = next_byte(link, deadline, Phase::WaitStart, timeout)? {
                if byte == STX {
                    if skipped > 0 {
                        trace!(skipped, "discarded bytes before packet start");
                    }
                    return Ok(());
                }
                skipped += 1;
            }
        }
    }

    fn accumulate<L: SerialLink + ?Sized>(&mut self, link: &mut L, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(byte) = next_byte(link, deadline, Phase::Accumulate, timeout)? {
                if byte == ETX {
                    return Ok(());
                }
                self.buf.extend_from_slice(&[byte]);
            }
        }
    }

    fn validate(&mut self, timeout: Duration) -> Result<Bytes> {
        let Some((&actual, _)) = self.buf.split_last() else {
            return Err(FrameError::NoResponse {
                phase: Phase::Validate,
                timeout,
            });
        };

        let mut payload = self.buf.split();
        payload.truncate(payload.len() - 1);
        let expected = checksum(&payload);
        if expected != actual {
            debug!(expected, actual, len = payload.len(), "packet checksum mismatch");
            return Err(FrameError::InvalidChecksum { expected, actual });
        }

        debug!(len = payload.len(), "received packet");
        Ok(payload.freeze())
    }
}

impl Default for PacketReader {
    fn default() -> Self {
        Self::new()
    }
}

fn next_byte<L: SerialLink + ?Sized>(
    link: &mut L,
    deadline: Instant,
    phase: Phase,
    timeout: Duration,
) -> Result<Option<u8>> {
    if Instant::now() >= deadline {
        return Err(FrameError::NoResponse { phase, timeout });
    }
    Ok(link.read(1)?.first().copied())
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use memolink_transport::{MockLink, TransportError};

    use super::*;
    use crate::codec::encode_packet;

    fn open_link() -> MockLink {
        let mut link = MockLink::with_timeout(Duration::from_millis(20));
        link.open().expect("mock link should open");
        link
    }

    fn wire(payload: &[u8]) -> Vec<u8> {
        let mut dst = BytesMut::new();
        encode_packet(payload, &mut dst);
        dst.to_vec()
    }

    #[test]
    fn reads_valid_packet() {
        let mut link = open_link();
        link.push_rx(&wire(&[0x10, 0x20, 0x30]));

        let payload = PacketReader::new().read_packet(&mut link).unwrap();
        assert_eq!(payload.as_ref(), &[0x10, 0x20, 0x30]);
    }

    #[test]
    fn skips_noise_before_start() {
        let mut link = open_link();
        link.push_rx(&[0xFF, 0x00, 0x55]);
        link.push_rx(&wire(&[0x42]));

        let payload = PacketReader::new().read_packet(&mut link).unwrap();
        assert_eq!(payload.as_ref(), &[0x42]);
    }

    #[test]
    fn leaves_following_bytes_unread() {
        let mut link = open_link();
        link.push_rx(&wire(&[0x01]));
        link.push_rx(&wire(&[0x02]));

        let mut reader = PacketReader::new();
        assert_eq!(reader.read_packet(&mut link).unwrap().as_ref(), &[0x01]);
        assert_eq!(reader.read_packet(&mut link).unwrap().as_ref(), &[0x02]);
        assert_eq!(link.pending_rx(), 0);
    }

    #[test]
    fn checksum_mismatch_is_reported() {
        let mut link = open_link();
        link.push_rx(&[STX, 0x10, 0x20, 0x31, ETX]);

        let err = PacketReader::new().read_packet(&mut link).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidChecksum {
                expected: 0x30,
                actual: 0x31
            }
        ));
    }

    #[test]
    fn checksum_wraps_for_large_payloads() {
        let payload = vec![0x80; 0x20];
        let mut link = open_link();
        link.push_rx(&wire(&payload));

        let got = PacketReader::new().read_packet(&mut link).unwrap();
        assert_eq!(got.as_ref(), payload.as_slice());
    }

    #[test]
    fn silence_times_out_waiting_for_start() {
        let mut link = open_link();
        let err = PacketReader::new().read_packet(&mut link).unwrap_err();
        assert!(matches!(
            err,
            FrameError::NoResponse {
                phase: Phase::WaitStart,
                ..
            }
        ));
        assert!(err.is_no_response());
    }

    #[test]
    fn missing_end_marker_times_out_accumulating() {
        let mut link = open_link();
        link.push_rx(&[STX, 0x10, 0x10]);

        let err = PacketReader::with_timeout(Duration::from_millis(10))
            .read_packet(&mut link)
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::NoResponse {
                phase: Phase::Accumulate,
                ..
            }
        ));
    }

    #[test]
    fn empty_packet_has_no_checksum_byte() {
        let mut link = open_link();
        link.push_rx(&[STX, ETX]);

        let err = PacketReader::new().read_packet(&mut link).unwrap_err();
        assert!(matches!(
            err,
            FrameError::NoResponse {
                phase: Phase::Validate,
                ..
            }
        ));
    }

    #[test]
    fn checksum_only_packet_is_empty_payload() {
        let mut link = open_link();
        link.push_rx(&[STX, 0x00, ETX]);

        let payload = PacketReader::new().read_packet(&mut link).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn closed_link_surfaces_transport_error() {
        let mut link = MockLink::new();
        let err = PacketReader::new().read_packet(&mut link).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Transport(TransportError::Closed)
        ));
    }
}
