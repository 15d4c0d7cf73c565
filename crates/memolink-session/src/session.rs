use std::time::{Duration, Instant};

use memolink_frame::{
    build_read_command, MemorySpace, PacketReader, BAUD_1200_COMMAND, BAUD_9600_ACK,
    BAUD_9600_COMMAND, IDENTITY_QUERY, WAKE_UP,
};
use memolink_roll::bcd_to_int;
use memolink_transport::{CloseHandle, SerialLink};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::ring::RingGeometry;

/// Largest payload one read command may request.
pub const MAX_READ_CHUNK: usize = 0x80;

const IDENTITY_REPLY_LEN: usize = 16;
const IDENTITY_HEADER_LEN: usize = 4;
const IDENTITY_TRAILER_LEN: usize = 3;
const HIGH_BAUD_RATE: u32 = 9600;
const LOW_BAUD_RATE: u32 = 1200;
const INIT_STEPS: u32 = 8;

/// Roll currently loaded in the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurrentRoll {
    pub roll: u16,
    pub frame: u8,
}

/// Everything the connect sequence learns about the camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraInfo {
    pub model: String,
    pub total_shots: u16,
    pub geometry: RingGeometry,
    pub current_roll: CurrentRoll,
}

/// Protocol state for one camera connection.
///
/// Every operation is a blocking request/response exchange. The session
/// must not be shared between threads; use [`Camera`](crate::Camera) for
/// that.
pub struct Session<L> {
    pub(crate) link: L,
    pub(crate) reader: PacketReader,
    pub(crate) config: SessionConfig,
    pub(crate) geometry: Option<RingGeometry>,
    model: Option<String>,
    initial_baud: u32,
}

impl<L: SerialLink> Session<L> {
    /// Create a session with default configuration.
    pub fn new(link: L) -> Self {
        Self::with_config(link, SessionConfig::default())
    }

    /// Create a session with explicit configuration.
    pub fn with_config(link: L, config: SessionConfig) -> Self {
        let initial_baud = link.baud_rate();
        Self {
            link,
            reader: PacketReader::new(),
            config,
            geometry: None,
            model: None,
            initial_baud,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Last geometry snapshot, if one is cached.
    pub fn geometry(&self) -> Option<&RingGeometry> {
        self.geometry.as_ref()
    }

    /// Model string reported by the camera, once queried.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Handle that closes the link from another thread.
    pub fn close_handle(&self) -> CloseHandle {
        self.link.close_handle()
    }

    /// Open the link at the rate the session was created with.
    pub fn open(&mut self) -> Result<()> {
        self.link.open()?;
        if self.link.baud_rate() != self.initial_baud {
            self.link.set_baud_rate(self.initial_baud)?;
        }
        info!(baud_rate = self.initial_baud, "camera link opened");
        Ok(())
    }

    /// Close the link. See [`SerialLink::close`].
    pub fn close(&mut self, force: bool) -> bool {
        let closed = self.link.close(force);
        if closed {
            info!("camera link closed");
        }
        closed
    }

    /// Send the wake byte and let the line settle. No reply is expected.
    pub fn wake_up(&mut self) -> Result<()> {
        debug!("waking camera");
        self.link.write_all(&WAKE_UP)?;
        std::thread::sleep(self.config.settle_delay);
        self.link.flush_input()?;
        Ok(())
    }

    /// Ask the camera for its model string.
    pub fn query_model(&mut self) -> Result<String> {
        self.link.flush_input()?;
        self.link.write_all(&IDENTITY_QUERY)?;
        let reply = self.link.read(IDENTITY_REPLY_LEN)?;
        if reply.len() < IDENTITY_HEADER_LEN + IDENTITY_TRAILER_LEN {
            return Err(SessionError::NoResponse(format!(
                "identity reply too short ({} bytes)",
                reply.len()
            )));
        }

        let text = &reply[IDENTITY_HEADER_LEN..reply.len() - IDENTITY_TRAILER_LEN];
        let model: String = text.utf8_chunks().map(|chunk| chunk.valid()).collect();
        debug!(%model, "camera model");
        self.model = Some(model.clone());
        Ok(model)
    }

    /// Read `length` bytes starting at `address`.
    ///
    /// Issues one command per [`MAX_READ_CHUNK`] bytes. All chunks share a
    /// single deadline of the link timeout.
    pub fn read_data(&mut self, space: MemorySpace, address: u16, length: usize) -> Result<Vec<u8>> {
        let timeout = self.link.timeout();
        let started = Instant::now();
        let mut data = Vec::with_capacity(length);
        let mut offset = 0usize;

        while offset < length {
            let chunk = MAX_READ_CHUNK.min(length - offset);
            let chunk_addr = address.wrapping_add(offset as u16);

            self.link.flush_input()?;
            self.link
                .write_all(&build_read_command(space, chunk_addr, chunk as u8))?;
            let payload = self.reader.read_packet(&mut self.link)?;
            // An ETX inside a corrupted payload cuts the packet short.
            if payload.len() != chunk {
                return Err(SessionError::PacketLength {
                    address: chunk_addr,
                    requested: chunk,
                    received: payload.len(),
                });
            }
            data.extend_from_slice(&payload);
            offset += chunk;

            if started.elapsed() > timeout {
                return Err(deadline_exceeded(address, length, timeout));
            }
        }

        Ok(data)
    }

    /// Read one byte of primary memory.
    pub fn read_register(&mut self, address: u16) -> Result<u8> {
        let data = self.read_data(MemorySpace::Primary, address, 1)?;
        data.first()
            .copied()
            .ok_or_else(|| SessionError::NoResponse(format!("empty reply for 0x{address:04X}")))
    }

    /// Read a little-endian 16-bit value from primary memory.
    pub fn read_le16(&mut self, address: u16) -> Result<u16> {
        let data = self.read_data(MemorySpace::Primary, address, 2)?;
        le16(&data, 0).ok_or_else(|| {
            SessionError::NoResponse(format!("short reply for 0x{address:04X}"))
        })
    }

    /// Switch camera and link to 9600 baud.
    pub fn set_9600_baud(&mut self) -> Result<()> {
        self.switch_baud(&BAUD_9600_COMMAND, Some(&BAUD_9600_ACK), HIGH_BAUD_RATE)
    }

    /// Switch camera and link back to 1200 baud.
    pub fn set_1200_baud(&mut self) -> Result<()> {
        self.switch_baud(&BAUD_1200_COMMAND, None, LOW_BAUD_RATE)
    }

    fn switch_baud(&mut self, command: &[u8], expected_ack: Option<&[u8]>, rate: u32) -> Result<()> {
        self.link.flush_input()?;
        self.link.write_all(command)?;
        let ack = self.link.read(2)?;
        if let Some(expected) = expected_ack {
            if ack != expected {
                warn!(?ack, ?expected, rate, "unexpected baud switch acknowledgement");
            }
        }
        std::thread::sleep(self.config.settle_delay);
        self.link.flush_input()?;
        self.link.set_baud_rate(rate)?;
        info!(rate, "baud rate switched");
        Ok(())
    }

    /// Lifetime shutter count.
    pub fn query_total_shots(&mut self) -> Result<u16> {
        let total = self.read_le16(self.config.memory_map.total_shots_addr)?;
        debug!(total, "total shots");
        Ok(total)
    }

    /// Roll number and frame counter of the loaded film.
    pub fn query_current_roll(&mut self) -> Result<CurrentRoll> {
        let map = self.config.memory_map;
        let bcd = self.read_data(MemorySpace::Primary, map.roll_number_addr, 2)?;
        let &[ones, hundreds] = bcd.as_slice() else {
            return Err(SessionError::NoResponse(format!(
                "short roll number reply ({} bytes)",
                bcd.len()
            )));
        };
        let roll = u16::from(bcd_to_int(ones)) + u16::from(bcd_to_int(hundreds)) * 100;
        let frame = self.read_register(map.frame_number_addr)?;
        debug!(roll, frame, "current roll");
        Ok(CurrentRoll { roll, frame })
    }

    /// Run the connect sequence.
    ///
    /// Progress is reported in eight steps. The link is force-closed when it
    /// cannot be opened or the camera does not identify itself.
    pub fn init(&mut self, progress: impl FnMut(u8)) -> Result<CameraInfo> {
        self.init_with(progress, || {})
    }

    /// [`init`](Self::init), calling `opened` as soon as the link is open.
    pub fn init_with(
        &mut self,
        mut progress: impl FnMut(u8),
        opened: impl FnOnce(),
    ) -> Result<CameraInfo> {
        progress(init_step(1));
        if let Err(err) = self.open() {
            self.link.close(true);
            return Err(err);
        }
        opened();

        progress(init_step(2));
        self.wake_up()?;

        progress(init_step(3));
        let model = match self.query_model() {
            Ok(model) => model,
            Err(err) => {
                self.link.close(true);
                return Err(err);
            }
        };

        progress(init_step(4));
        if self.config.high_speed {
            self.set_9600_baud()?;
        }

        progress(init_step(5));
        let total_shots = self.query_total_shots()?;

        progress(init_step(6));
        let geometry = self.query_geometry()?;

        progress(init_step(7));
        let current_roll = self.query_current_roll()?;

        progress(100);
        info!(%model, total_shots, roll = current_roll.roll, "camera initialised");
        Ok(CameraInfo {
            model,
            total_shots,
            geometry,
            current_roll,
        })
    }
}

impl<L> std::fmt::Debug for Session<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("model", &self.model)
            .field("geometry", &self.geometry)
            .finish_non_exhaustive()
    }
}

fn init_step(step: u32) -> u8 {
    (100 * step / INIT_STEPS) as u8
}

fn deadline_exceeded(address: u16, length: usize, timeout: Duration) -> SessionError {
    SessionError::NoResponse(format!(
        "reading {length} bytes at 0x{address:04X} exceeded {timeout:?}"
    ))
}

pub(crate) fn le16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}
